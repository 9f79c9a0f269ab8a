use burn::tensor::{backend::Backend, Data, ElementConversion, Int, Shape, Tensor};

/// Pad per-sequence ids to a specific length, typically to line labels up with tokenized sequences
pub fn pad_to<B: Backend>(
    pad_id: usize,
    ids_list: Vec<Vec<usize>>,
    seq_length: usize,
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let batch_size = ids_list.len();

    let mut tensor = Tensor::zeros([batch_size, seq_length], device);
    tensor = tensor.add_scalar(pad_id as i64);

    for (index, mut ids) in ids_list.into_iter().enumerate() {
        ids.truncate(seq_length);

        let length = ids.len();
        if length == 0 {
            continue;
        }

        tensor = tensor.slice_assign(
            [index..index + 1, 0..length],
            Tensor::from_data(
                Data::new(
                    ids.into_iter().map(|e| (e as i64).elem()).collect(),
                    Shape::new([1, length]),
                ),
                device,
            ),
        );
    }

    tensor
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_pad_to_fills_with_pad_id() {
        let device = Default::default();

        let tensor = pad_to::<NdArray>(9, vec![vec![1, 2, 3], vec![4]], 4, &device);

        let values = tensor.into_data().convert::<i64>().value;

        assert_eq!(values, vec![1, 2, 3, 9, 4, 9, 9, 9]);
    }

    #[test]
    fn test_pad_to_truncates_long_rows() {
        let device = Default::default();

        let tensor = pad_to::<NdArray>(0, vec![vec![1, 2, 3, 4, 5]], 3, &device);

        assert_eq!(tensor.dims(), [1, 3]);
        assert_eq!(tensor.into_data().convert::<i64>().value, vec![1, 2, 3]);
    }
}
