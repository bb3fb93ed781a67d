//! Minimizes the 10-dimensional Rosenbrock function with Curveball.
//!
//! The parameters are read as two rows of five values, the loss is not a
//! squared error, so the optimizer uses Hessian-vector products.
//!
//! Run with: RUST_LOG=debug cargo run --example rosenbrock

use curveball::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// The Rosenbrock function on two rows `a = p[..k]`, `b = p[k..]`.
#[derive(Debug)]
struct Rosenbrock {
    half: usize,
}

impl Loss<f64> for Rosenbrock {
    fn input_dim(&self) -> Option<usize> {
        Some(2 * self.half)
    }

    fn value(&self, p: &DVector<f64>) -> Result<f64> {
        Ok((0..self.half)
            .map(|i| {
                let (a, b) = (p[i], p[self.half + i]);
                100.0 * (b - a * a).powi(2) + (1.0 - a).powi(2)
            })
            .sum())
    }

    fn gradient(&self, p: &DVector<f64>) -> Result<DVector<f64>> {
        let mut g = DVector::zeros(p.len());
        for i in 0..self.half {
            let (a, b) = (p[i], p[self.half + i]);
            g[i] = -400.0 * a * (b - a * a) - 2.0 * (1.0 - a);
            g[self.half + i] = 200.0 * (b - a * a);
        }
        Ok(g)
    }

    fn hessian_vector_product(&self, p: &DVector<f64>, v: &DVector<f64>) -> Result<DVector<f64>> {
        let mut hv = DVector::zeros(p.len());
        for i in 0..self.half {
            let (a, b) = (p[i], p[self.half + i]);
            let (va, vb) = (v[i], v[self.half + i]);
            hv[i] = (1200.0 * a * a - 400.0 * b + 2.0) * va - 400.0 * a * vb;
            hv[self.half + i] = -400.0 * a * va + 200.0 * vb;
        }
        Ok(hv)
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let loss = CountingLoss::new(Rosenbrock { half: 5 });
    let mut optimizer = Curveball::new(
        DVector::zeros(10),
        IdentityModel::new(10),
        &loss,
        false,
        CurveballConfig::default(),
    )?;

    let criterion = StoppingCriterion::new()
        .with_target_value(1e-10)
        .with_max_iterations(500);
    let mut logger = LoggingCallback::new(5);
    let result = optimizer.optimize_with_callback(&criterion, &mut logger)?;

    println!("Termination: {}", result.termination_reason);
    println!("Iterations:  {}", result.iterations);
    println!("Final loss:  {:.3e}", result.value);
    println!("Solution:    {:.6}", result.point.transpose());
    println!("Loss evaluations: {:?}", loss.counts());

    Ok(())
}
