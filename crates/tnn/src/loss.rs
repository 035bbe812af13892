//! Loss functions composed from the public operators.

use crate::autodiff::{Operand, Pow, Tensor};
use crate::error::AutogradError;

/// Squared error `(prediction - target) ** 2`.
pub fn mse(prediction: Tensor, target: impl Into<Operand>) -> Result<Tensor, AutogradError> {
    (prediction - target)?.pow(2)
}

/// Sum of [`mse`] over `(prediction, target)` pairs.
///
/// An empty slice gives a constant zero.
pub fn mse_sum(pairs: &[(Tensor, Operand)]) -> Result<Tensor, AutogradError> {
    let Some(((first_pred, first_target), rest)) = pairs.split_first() else {
        return Ok(Tensor::new(0.0));
    };
    rest.iter()
        .try_fold(mse(*first_pred, *first_target)?, |total, &(pred, target)| {
            total + mse(pred, target)?
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mse_value_and_grad() {
        let a = Tensor::leaf(5.0);
        let b = Tensor::new(2.0);
        let loss = mse(a, b).unwrap();
        assert_eq!(loss.data().unwrap(), 9.0);
        loss.grad_ctx().unwrap().backward(1.0).unwrap();
        assert_eq!(a.grad().unwrap(), 6.0);
        assert_eq!(b.grad().unwrap(), 0.0);
    }

    #[test]
    fn test_mse_negative_residual() {
        let a = Tensor::leaf(2.0);
        let loss = mse(a, 5.0).unwrap();
        assert_eq!(loss.data().unwrap(), 9.0);
        loss.backward().unwrap();
        assert_eq!(a.grad().unwrap(), -6.0);
    }

    #[test]
    fn test_mse_sum() {
        let w = Tensor::leaf(2.0);
        let p1 = (w * 1.0).unwrap();
        let p2 = (w * 3.0).unwrap();
        let loss = mse_sum(&[(p1, 1.0.into()), (p2, 3.0.into())]).unwrap();
        // (2-1)^2 + (6-3)^2
        assert_eq!(loss.data().unwrap(), 10.0);
        loss.backward().unwrap();
        // 2*(2-1)*1 + 2*(6-3)*3
        assert_eq!(w.grad().unwrap(), 20.0);
    }

    #[test]
    fn test_mse_sum_empty() {
        let loss = mse_sum(&[]).unwrap();
        assert_eq!(loss.data().unwrap(), 0.0);
        assert!(!loss.requires_grad().unwrap());
    }
}
