//! Scalar statistics.

pub use super::*;

/// Compute the standard deviation over every element of the tensor.
///
/// Population form: `sqrt(E[x^2] - E[x]^2)`.
///
/// ## Shapes
///
/// * `output` - `[1]`
pub fn standard_deviation<B: Backend, const D: usize>(
    tensor: Tensor<B, D>,
) -> Tensor<B, 1> {
    let mean = tensor.to_owned().mean();
    let mean_of_squares = tensor.powf_scalar(2.0).mean();
    (mean_of_squares - mean.powf_scalar(2.0))
        .clamp_min(0.0)
        .sqrt()
}

#[cfg(test)]
mod tests {
    #[test]
    fn known_value() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        let tensor =
            Tensor::<B, 2>::from_data([[1.0, 2.0], [3.0, 4.0]], device);
        let value = standard_deviation(tensor);
        value.into_data().assert_approx_eq_diff(
            &Tensor::<B, 1>::from_data([1.118034], device).into_data(),
            1e-5,
        );
    }

    #[test]
    fn zero_for_constant_tensors() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        let tensor = Tensor::<B, 3>::full([2, 3, 4], -0.25, device);
        let value = standard_deviation(tensor);
        value.into_data().assert_approx_eq_diff(
            &Tensor::<B, 1>::zeros([1], device).into_data(),
            1e-6,
        );
    }
}
