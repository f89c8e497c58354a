use burn::tensor::{Distribution, Tensor};
use divan::Bencher;
use dreamcanvas::{
    backend::NdArray,
    function::{gram_matrix, total_variation},
};

fn main() {
    divan::main();
}

type B = NdArray;

mod loss_terms {
    use super::*;

    #[divan::bench(sample_count = 100, sample_size = 2)]
    fn gram_matrix_64x112x112(bencher: Bencher) {
        bencher
            .with_inputs(|| {
                Tensor::<B, 4>::random(
                    [1, 64, 112, 112],
                    Distribution::Uniform(0.0, 1.0),
                    &Default::default(),
                )
            })
            .bench_local_values(gram_matrix);
    }

    #[divan::bench(sample_count = 100, sample_size = 2)]
    fn total_variation_3x448x448(bencher: Bencher) {
        bencher
            .with_inputs(|| {
                Tensor::<B, 4>::random(
                    [1, 3, 448, 448],
                    Distribution::Uniform(0.0, 1.0),
                    &Default::default(),
                )
            })
            .bench_local_values(total_variation);
    }
}
