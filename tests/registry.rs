use burn::{backend::NdArray, data::dataloader::batcher::Batcher as _};
use burn_classifiers::{
    cli::ModelArgs,
    data::{batcher::Tokenized, Batch, Batcher, Train},
    models::{lookup, ModelError, RegistryError, MODELS},
};
use pretty_assertions::assert_eq;

type TestBackend = NdArray;

const SEQ_LENGTH: usize = 6;

fn small_args() -> ModelArgs {
    ModelArgs {
        in_feat: SEQ_LENGTH,
        out_feat: 3,
        vocab_size: 20,
        embedding_dim: 8,
        batch_size: 4,
        dropout: 0.0,
        ..Default::default()
    }
    .with_option("--transformer-hidden-size", 16)
    .with_option("--transformer-n-heads", 2)
    .with_option("--transformer-n-layers", 1)
    .with_option("--bilstm-hidden-size", 4)
    .with_option("--cnn-n-filters", 3)
    .with_option("--cnn-kernel-sizes", "2,3")
    .with_option("--gru-hidden-size", 4)
    .with_option("--rnn-hidden-size", 4)
    .with_option("--bert-n-heads", 2)
    .with_option("--bert-n-layers", 1)
    .with_option("--bert-intermediate-size", 16)
    .with_option("--bert-max-position-embeddings", 16)
    .with_option("--netlstm-hidden-size", 4)
    .with_option("--netlstm-n-layers", 2)
}

fn labels() -> Vec<String> {
    vec!["negative".to_string(), "neutral".to_string(), "positive".to_string()]
}

fn train_batch() -> Train<TestBackend> {
    let batcher = Batcher::<TestBackend>::new(SEQ_LENGTH, 0, &labels(), Default::default());

    batcher.batch(vec![
        Tokenized::new(vec![3, 4, 5], "positive".to_string()),
        Tokenized::new(vec![6], "negative".to_string()),
        Tokenized::new(vec![7, 8, 9, 10, 11, 12, 13, 14], "neutral".to_string()),
        Tokenized::new(vec![15, 16], "sarcastic".to_string()),
    ])
}

#[test]
fn every_registered_model_classifies_batcher_output() {
    let args = small_args();
    let Train { input, targets } = train_batch();

    for name in MODELS.names() {
        let architecture = lookup(name).unwrap();
        let model = architecture
            .make_model::<TestBackend>(&args, &Default::default())
            .unwrap_or_else(|e| panic!("{} failed to build: {}", name, e));

        assert_eq!(model.data_requirements(), architecture.data_requirements());
        input.check(model.data_requirements()).unwrap();
        assert!(model.num_params() > 0, "{} has no parameters", name);

        let output = model
            .classify(&input, targets.clone())
            .unwrap_or_else(|e| panic!("{} failed to classify: {}", name, e));

        assert_eq!(output.output.dims(), [4, 3], "{}", name);
        assert_eq!(output.loss.dims(), [1], "{}", name);
    }
}

#[test]
fn models_report_missing_inputs() {
    let args = small_args();
    let Train { input, .. } = train_batch();
    let tokens_only = Batch::new(input.tokens);

    for name in ["SoftmaxRegression", "NetLSTM"] {
        let model = lookup(name)
            .unwrap()
            .make_model::<TestBackend>(&args, &Default::default())
            .unwrap();

        assert!(matches!(
            model.forward(&tokens_only),
            Err(ModelError::MissingInput(_))
        ));
    }

    for name in ["CNN", "GRU", "RNN"] {
        let model = lookup(name)
            .unwrap()
            .make_model::<TestBackend>(&args, &Default::default())
            .unwrap();

        assert_eq!(model.forward(&tokens_only).unwrap().dims(), [4, 3]);
    }
}

#[test]
fn every_model_rejects_an_empty_batch() {
    let args = small_args();
    let batcher = Batcher::<TestBackend>::new(SEQ_LENGTH, 0, &labels(), Default::default());
    let empty: Batch<TestBackend> = batcher.batch(Vec::<Vec<usize>>::new());

    for name in MODELS.names() {
        let model = lookup(name)
            .unwrap()
            .make_model::<TestBackend>(&args, &Default::default())
            .unwrap();

        assert!(
            matches!(model.forward(&empty), Err(ModelError::EmptyBatch)),
            "{} accepted an empty batch",
            name
        );
    }
}

#[test]
fn embedding_models_report_their_vocabulary() {
    let args = small_args();

    for name in MODELS.names() {
        let model = lookup(name)
            .unwrap()
            .make_model::<TestBackend>(&args, &Default::default())
            .unwrap();

        let expected = match name {
            "SoftmaxRegression" => None,
            _ => Some(20),
        };

        assert_eq!(model.vocab_size(), expected, "{}", name);
    }
}

#[test]
fn fixed_length_models_reject_other_lengths() {
    let mut args = small_args();
    args.in_feat = SEQ_LENGTH + 2;

    let model = lookup("SoftmaxRegression")
        .unwrap()
        .make_model::<TestBackend>(&args, &Default::default())
        .unwrap();

    let Train { input, .. } = train_batch();

    assert!(matches!(
        model.forward(&input),
        Err(ModelError::SequenceLength {
            expected: 8,
            found: 6
        })
    ));
}

#[test]
fn builds_from_yaml_arguments() {
    let args = ModelArgs::from_yaml(
        r#"
in_feat: 6
out_feat: 3
vocab_size: 20
embedding_dim: 8
options:
  cnn-n-filters: 2
  cnn-kernel-sizes: [2, 4]
"#,
    )
    .unwrap();

    let model = lookup("CNN")
        .unwrap()
        .make_model::<TestBackend>(&args, &Default::default())
        .unwrap();

    let Train { input, .. } = train_batch();

    assert_eq!(model.forward(&input).unwrap().dims(), [4, 3]);
    assert_eq!(model.num_params(), 20 * 8 + (8 * 2 * 2 + 2) + (8 * 2 * 4 + 2) + (4 * 3 + 3));
}

#[test]
fn unknown_names_are_rejected() {
    assert_eq!(
        lookup("LSTM").unwrap_err(),
        RegistryError::Unknown("LSTM".to_string())
    );
}
