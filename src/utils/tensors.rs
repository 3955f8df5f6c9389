use burn::tensor::{backend::Backend, Bool, Data, ElementConversion, Int, Shape, Tensor};

/// Token ids padded to a fixed length, with the padding multiplier and mask derived from each
/// sequence's true length
#[derive(Debug, Clone)]
pub struct Padded<B: Backend> {
    /// Token ids: [batch_size, seq_length]
    pub tokens: Tensor<B, 2, Int>,

    /// 1.0 where a real token sits, 0.0 for padding
    pub padding: Tensor<B, 2>,

    /// true where a real token sits
    pub mask: Tensor<B, 2, Bool>,
}

/// Pad (or truncate) every token sequence to exactly `seq_length`, filling with `pad_token`
pub fn pad_to<B: Backend>(
    pad_token: usize,
    tokens_list: Vec<Vec<usize>>,
    seq_length: usize,
    device: &B::Device,
) -> Padded<B> {
    let batch_size = tokens_list.len();

    let pad: B::IntElem = (pad_token as i64).elem();

    let mut ids = Vec::with_capacity(batch_size * seq_length);
    let mut real = Vec::with_capacity(batch_size * seq_length);

    for tokens in tokens_list {
        let length = tokens.len().min(seq_length);

        ids.extend(
            tokens
                .into_iter()
                .take(seq_length)
                .map(|e| (e as i64).elem::<B::IntElem>()),
        );
        ids.extend(std::iter::repeat(pad).take(seq_length - length));

        real.extend((0..seq_length).map(|i| ((i < length) as i64).elem::<B::IntElem>()));
    }

    let shape = Shape::new([batch_size, seq_length]);

    let tokens = Tensor::from_data(Data::new(ids, shape.clone()), device);
    let real: Tensor<B, 2, Int> = Tensor::from_data(Data::new(real, shape), device);

    Padded {
        tokens,
        padding: real.clone().float(),
        mask: real.equal_elem(1),
    }
}

/// Reverse a [batch_size, seq_length, d] tensor along the sequence dimension
pub fn reverse_time<B: Backend>(x: Tensor<B, 3>) -> Tensor<B, 3> {
    let [_, seq_length, _] = x.dims();

    let indices = Tensor::from_data(
        Data::new(
            (0..seq_length)
                .rev()
                .map(|i| (i as i64).elem::<B::IntElem>())
                .collect(),
            Shape::new([seq_length]),
        ),
        &x.device(),
    );

    x.select(1, indices)
}

/// The final time step of a [batch_size, seq_length, d] tensor
pub fn last_step<B: Backend>(x: Tensor<B, 3>) -> Tensor<B, 2> {
    let [batch_size, seq_length, d] = x.dims();

    x.slice([0..batch_size, seq_length - 1..seq_length, 0..d])
        .reshape([batch_size, d])
}

/// The step at each sequence's last real position, given a 1.0/0.0 padding multiplier whose
/// real positions form a prefix
pub fn last_real_step<B: Backend>(x: Tensor<B, 3>, padding: Tensor<B, 2>) -> Tensor<B, 2> {
    let [batch_size, seq_length, d] = x.dims();

    if seq_length == 1 {
        return x.reshape([batch_size, d]);
    }

    // padding[t] - padding[t + 1] is one-hot at the last real position
    let next = Tensor::cat(
        vec![
            padding.clone().slice([0..batch_size, 1..seq_length]),
            Tensor::zeros([batch_size, 1], &padding.device()),
        ],
        1,
    );
    let weights = (padding - next).reshape([batch_size, seq_length, 1]);

    (x * weights).sum_dim(1).reshape([batch_size, d])
}

/// Mean over the real positions of a [batch_size, seq_length, d] tensor
pub fn masked_mean<B: Backend>(x: Tensor<B, 3>, padding: Tensor<B, 2>) -> Tensor<B, 2> {
    let [batch_size, seq_length, d] = x.dims();

    let counts = padding.clone().sum_dim(1).clamp_min(1.0);
    let weights = padding.reshape([batch_size, seq_length, 1]);

    (x * weights).sum_dim(1).reshape([batch_size, d]) / counts
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use super::*;

    type TestBackend = NdArray;

    #[test]
    fn pads_short_sequences_and_truncates_long_ones() {
        let device = Default::default();

        let padded = pad_to::<TestBackend>(0, vec![vec![5, 6], vec![1, 2, 3, 4, 5]], 4, &device);

        assert_eq!(padded.tokens.dims(), [2, 4]);
        assert_eq!(
            padded.tokens.into_data().convert::<i64>().value,
            vec![5, 6, 0, 0, 1, 2, 3, 4]
        );
        assert_eq!(
            padded.padding.into_data().convert::<f32>().value,
            vec![1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]
        );
        assert_eq!(
            padded.mask.into_data().value,
            vec![true, true, false, false, true, true, true, true]
        );
    }

    #[test]
    fn masks_follow_lengths_not_pad_values() {
        let device = Default::default();

        // A real token that happens to share the pad id stays unmasked
        let padded = pad_to::<TestBackend>(7, vec![vec![7, 3]], 3, &device);

        assert_eq!(padded.tokens.into_data().convert::<i64>().value, vec![7, 3, 7]);
        assert_eq!(padded.mask.into_data().value, vec![true, true, false]);
    }

    fn sequence(values: [[[f32; 2]; 3]; 1]) -> Tensor<TestBackend, 3> {
        Tensor::from_floats(values, &Default::default())
    }

    #[test]
    fn reverses_the_time_dimension() {
        let x = sequence([[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]]);

        assert_eq!(
            reverse_time(x).into_data().convert::<f32>().value,
            vec![5.0, 6.0, 3.0, 4.0, 1.0, 2.0]
        );
    }

    #[test]
    fn picks_final_and_last_real_steps() {
        let x = sequence([[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]]);
        let padding = Tensor::from_floats([[1.0, 1.0, 0.0]], &Default::default());

        assert_eq!(
            last_step(x.clone()).into_data().convert::<f32>().value,
            vec![5.0, 6.0]
        );
        assert_eq!(
            last_real_step(x, padding).into_data().convert::<f32>().value,
            vec![3.0, 4.0]
        );
    }

    #[test]
    fn averages_only_real_positions() {
        let x = sequence([[[1.0, 2.0], [3.0, 4.0], [50.0, 60.0]]]);
        let padding = Tensor::from_floats([[1.0, 1.0, 0.0]], &Default::default());

        assert_eq!(
            masked_mean(x, padding).into_data().convert::<f32>().value,
            vec![2.0, 3.0]
        );
    }
}
