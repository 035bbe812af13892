//! Fit `y = w * x + b` to a handful of points by gradient descent.
//!
//! Run with `RUST_LOG=debug` to watch the traversals and set
//! `TNN_LEARNING_RATE` / `TNN_TRAVERSAL` to change the step.

use tnn::autodiff::{Operand, Tensor, clear_graph, with_graph};
use tnn::{AutogradError, StepConfig, Traversal, loss};

const POINTS: [(f64, f64); 4] = [(0.0, 1.0), (1.0, 3.0), (2.0, 5.0), (3.0, 7.0)];
const STEPS: usize = 200;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = StepConfig::with_learning_rate(0.02)
        .traversal(Traversal::Once)
        .with_env_overrides()?;
    log::info!(
        "learning_rate={} traversal={}",
        config.learning_rate,
        config.traversal
    );

    clear_graph();
    let mut w = Tensor::leaf(0.0);
    let mut b = Tensor::leaf(0.0);

    for step in 0..STEPS {
        let pairs = POINTS
            .iter()
            .map(|&(x, y)| -> Result<(Tensor, Operand), AutogradError> {
                Ok((((w * x)? + b)?, Operand::from(y)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let l = loss::mse_sum(&pairs)?;
        let ctx = l.grad_ctx()?;
        ctx.backward(1.0)?;
        ctx.update_with(&config)?;
        ctx.zero_grad_with(config.traversal)?;

        if step % 20 == 0 {
            println!("step {step:4}  loss {:.6}", l.data()?);
        }

        // carry the parameters into a fresh graph so it does not grow
        let (wv, bv) = (w.data()?, b.data()?);
        clear_graph();
        w = Tensor::leaf(wv);
        b = Tensor::leaf(bv);
    }

    println!("w = {:.4}, b = {:.4}", w.data()?, b.data()?);
    println!("graph nodes: {}", with_graph(|g| g.len()));
    Ok(())
}
