//! Fits `y = a · exp(b · t)` to noisy-free samples with Curveball.
//!
//! The model supplies analytic Jacobian products; the loss is a squared
//! error, so the Gauss-Newton curvature is used and the loss Hessian is
//! never evaluated. The same fit with a hand-picked learning rate and
//! momentum is shown for comparison.
//!
//! Run with: cargo run --example curve_fit

use curveball::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
struct Exponential {
    times: DVector<f64>,
}

impl ForwardModel<f64> for Exponential {
    fn input_dim(&self) -> usize {
        2
    }

    fn output_dim(&self) -> usize {
        self.times.len()
    }

    fn predict(&self, x: &DVector<f64>) -> Result<DVector<f64>> {
        Ok(self.times.map(|t| x[0] * (x[1] * t).exp()))
    }

    fn jvp(&self, x: &DVector<f64>, v: &DVector<f64>) -> Result<DVector<f64>> {
        Ok(self.times.map(|t| {
            let e = (x[1] * t).exp();
            e * v[0] + x[0] * t * e * v[1]
        }))
    }

    fn vjp(&self, x: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>> {
        let (mut da, mut db) = (0.0, 0.0);
        for (t, w) in self.times.iter().zip(u.iter()) {
            let e = (x[1] * t).exp();
            da += e * w;
            db += x[0] * t * e * w;
        }
        Ok(DVector::from_vec(vec![da, db]))
    }
}

fn fit(config: CurveballConfig<f64>) -> std::result::Result<OptimizationResult<f64>, OptimizerError> {
    let times = DVector::from_fn(25, |i, _| i as f64 * 0.125);
    let target = times.map(|t| 2.0 * (-0.5 * t).exp());
    let model = Exponential { times };

    // Sanity-check the hand-written derivatives before optimizing.
    let x = DVector::from_vec(vec![1.0, 0.1]);
    let v = DVector::from_vec(vec![0.3, -0.7]);
    let u = DVector::from_fn(model.output_dim(), |i, _| (i as f64).sin());
    let (adjoint_ok, error) = DerivativeChecker::check_adjoint(&model, &x, &v, &u, 1e-10)?;
    tracing::info!(adjoint_ok, error = %error, "adjoint check");

    let mut optimizer = Curveball::new(
        DVector::from_vec(vec![1.0, 0.0]),
        model,
        SquaredLoss::new(target),
        true,
        config,
    )?;

    optimizer.optimize(
        &StoppingCriterion::new()
            .with_target_value(1e-12)
            .with_max_iterations(2000),
    )
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let automatic = fit(CurveballConfig::default())?;
    let fixed = fit(CurveballConfig::default().with_fixed_step(0.01, 0.9))?;

    for (name, result) in [("automatic", &automatic), ("fixed", &fixed)] {
        println!(
            "{name:>9}: {:4} iterations, loss {:.3e}, a = {:.6}, b = {:.6} ({})",
            result.iterations,
            result.value,
            result.point[0],
            result.point[1],
            result.termination_reason
        );
    }

    Ok(())
}
