//! Command line tool to list, describe and smoke-test the registered models

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use burn::{backend::NdArray, data::dataloader::batcher::Batcher as _, tensor::ElementConversion};
use burn_classifiers::{
    cli::{arguments::COMMON_HELP, ModelArgs},
    data::{
        batcher::{Tokenized, UNK_LABEL},
        Batcher, Train,
    },
    models::{embedding::Pretrained, lookup, Architecture, MODELS},
    utils::hugging_face::download_hf_config,
};
use pico_args::Arguments;
use rand::Rng;

const HELP: &str = "\
Usage: models COMMAND [NAME] [OPTIONS]

Commands:
  list                 List the registered models
  describe NAME        Print the options a model accepts
  run NAME             Build a model and classify a random batch

Options:
  -h, --help           Print help
  -c, --config         Path to a YAML file of model arguments
  --embeddings         Path to pretrained embedding vectors, one per line
  --bert-pretrained    Hugging Face model whose config.json sets up BERT (e.g., 'bert-base-cased')
";

#[derive(Debug)]
enum Command {
    List,
    Describe(Architecture),
    Run(Architecture),
}

#[derive(Debug)]
struct Args {
    command: Command,
    config: Option<PathBuf>,
    embeddings: Option<PathBuf>,
    bert_pretrained: Option<String>,
}

impl Args {
    fn parse(pargs: &mut Arguments) -> Result<Option<Self>> {
        // Help has a higher priority and should be handled separately.
        if pargs.contains(["-h", "--help"]) {
            return Ok(None);
        }

        let command = match pargs.subcommand()?.as_deref() {
            Some("list") => Command::List,
            Some("describe") => Command::Describe(Self::architecture(pargs)?),
            Some("run") => Command::Run(Self::architecture(pargs)?),
            Some(other) => return Err(anyhow!("Unknown command: {}", other)),
            None => return Ok(None),
        };

        Ok(Some(Args {
            command,
            config: pargs.opt_value_from_str(["-c", "--config"])?,
            embeddings: pargs.opt_value_from_str("--embeddings")?,
            bert_pretrained: pargs.opt_value_from_str("--bert-pretrained")?,
        }))
    }

    fn architecture(pargs: &mut Arguments) -> Result<Architecture> {
        let name: String = pargs.free_from_str().map_err(|e| match e {
            pico_args::Error::MissingArgument => anyhow!("Missing required argument: NAME"),
            _ => anyhow!("{}", e),
        })?;

        Ok(lookup(&name)?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    let mut pargs = Arguments::from_env();

    let Some(args) = Args::parse(&mut pargs)? else {
        print!("{}", HELP);

        return Ok(());
    };

    match args.command {
        Command::List => {
            for name in MODELS.names() {
                println!("{}", name);
            }

            Ok(())
        }
        Command::Describe(architecture) => {
            let inputs: Vec<&str> = architecture
                .data_requirements()
                .iter()
                .map(|r| r.as_str())
                .collect();

            println!("{} (inputs: {})\n", architecture, inputs.join(", "));
            print!("{}\n{}", COMMON_HELP, architecture.arguments());

            Ok(())
        }
        Command::Run(architecture) => {
            let model_args = load_args(&args, &mut pargs, architecture).await?;

            let remaining = pargs.finish();
            if !remaining.is_empty() {
                return Err(anyhow!("Unrecognized arguments: {:?}", remaining));
            }

            run(architecture, &model_args)
        }
    }
}

/// Merge defaults, a YAML file, pretrained resources and command line options, in that order
async fn load_args(
    args: &Args,
    pargs: &mut Arguments,
    architecture: Architecture,
) -> Result<ModelArgs> {
    let mut model_args = match &args.config {
        Some(path) => {
            let yaml = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| anyhow!("Unable to read {}: {}", path.display(), e))?;

            ModelArgs::from_yaml(&yaml)?
        }
        None => ModelArgs::default(),
    };

    model_args.parse(pargs, &architecture.arguments())?;

    if let Some(path) = &args.embeddings {
        model_args.embeddings = Some(Pretrained::load(path).await?);
    }

    if let Some(name) = &args.bert_pretrained {
        let path = download_hf_config(name).await?;

        model_args = model_args.with_option("--bert-config", path.display());
    }

    Ok(model_args)
}

/// Build the model and run it over a random batch with random labels
fn run(architecture: Architecture, args: &ModelArgs) -> Result<()> {
    type Backend = NdArray;

    let device = Default::default();
    let model = architecture.make_model::<Backend>(args, &device)?;

    println!("{} with {} parameters", architecture, model.num_params());

    if args.batch_size == 0 {
        return Err(anyhow!("--batch-size must be non-zero"));
    }

    // A loaded BERT config can set a different vocabulary than the arguments
    let vocab_size = model
        .vocab_size()
        .unwrap_or_else(|| args.embedding_shape().0)
        .max(1);
    let labels: Vec<String> = (0..args.out_feat).map(|i| format!("class-{}", i)).collect();

    let mut rng = rand::thread_rng();
    let items: Vec<Tokenized> = (0..args.batch_size)
        .map(|_| {
            let length = rng.gen_range(1..=args.in_feat);
            let tokens = (0..length).map(|_| rng.gen_range(0..vocab_size)).collect();
            let label = labels[rng.gen_range(0..labels.len())].clone();

            Tokenized::new(tokens, label)
        })
        .collect();

    let batcher = Batcher::<Backend>::new(args.in_feat, args.pad_token_id, &labels, device);
    let Train { input, targets } = batcher.batch(items);

    let output = model.classify(&input, targets)?;

    println!("Logits: {:?}", output.output.dims());
    println!("Loss: {:.4}", output.loss.into_scalar().elem::<f32>());

    let predicted = output.output.argmax(1).into_data().convert::<i64>().value;
    for (i, class_id) in predicted.into_iter().enumerate() {
        let label = batcher.label(class_id as usize).unwrap_or(UNK_LABEL);

        println!("  {:>3}: {}", i, label);
    }

    Ok(())
}
