//! Integration tests for the Curveball optimizer.

use approx::assert_relative_eq;
use curveball_core::{
    callback::{LossHistory, OptimizationCallback},
    counting::{CountingLoss, CountingModel},
    error::{ModelError, OptimizerError, Result},
    loss::{FnLoss, Loss, SquaredLoss},
    model::{FnModel, ForwardModel, IdentityModel},
    optimizer::{IterationInfo, StoppingCriterion, TerminationReason},
    test_utils::{ExponentialModel, RosenbrockLoss},
    types::DVector,
};
use curveball_optim::{
    CurvatureProduct, Curveball, CurveballConfig, DampingConfig, SolveKind,
};
use proptest::prelude::*;

fn exponential_problem() -> (ExponentialModel<f64>, SquaredLoss<f64>) {
    let times = DVector::from_vec(vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0]);
    let model = ExponentialModel::new(times);
    let target = model.sample(2.0, -0.5);
    (model, SquaredLoss::new(target))
}

#[test]
fn test_rosenbrock_thirty_steps() -> std::result::Result<(), OptimizerError> {
    let mut optimizer = Curveball::new(
        DVector::<f64>::zeros(10),
        IdentityModel::new(10),
        RosenbrockLoss::new(10),
        false,
        CurveballConfig::default(),
    )?;
    assert_eq!(optimizer.curvature(), CurvatureProduct::Hessian);

    let initial = optimizer.evaluate()?;
    assert_eq!(initial, 5.0);

    let mut losses = Vec::with_capacity(30);
    for _ in 0..30 {
        let outcome = optimizer.step()?;
        assert!(outcome.loss.is_finite());
        losses.push(outcome.loss);
    }
    println!("Rosenbrock losses: {losses:.3?}");

    // The first step overshoots from z = 0; the trend afterwards is what counts.
    let last = *losses.last().unwrap_or(&f64::NAN);
    assert!(last < initial);
    assert!(last < 1e-4, "loss after 30 steps: {last}");
    assert_eq!(optimizer.iteration(), 30);

    Ok(())
}

#[test]
fn test_rosenbrock_minimizer_is_all_ones() -> std::result::Result<(), OptimizerError> {
    let mut optimizer = Curveball::new(
        DVector::<f64>::zeros(10),
        IdentityModel::new(10),
        RosenbrockLoss::new(10),
        false,
        CurveballConfig::default(),
    )?;

    let criterion = StoppingCriterion::new()
        .with_target_value(1e-12)
        .with_max_iterations(300);
    let result = optimizer.optimize(&criterion)?;

    println!(
        "Rosenbrock: {} iterations, loss {:.3e}, reason {}",
        result.iterations, result.value, result.termination_reason
    );
    assert!(result.converged);
    for xi in result.point.iter() {
        assert_relative_eq!(*xi, 1.0, epsilon = 1e-4);
    }

    Ok(())
}

#[test]
fn test_exponential_fit() -> std::result::Result<(), OptimizerError> {
    let (model, loss) = exponential_problem();
    let mut optimizer = Curveball::new(
        DVector::from_vec(vec![1.0, 0.0]),
        model,
        loss,
        true,
        CurveballConfig::default(),
    )?;

    let result = optimizer.optimize(
        &StoppingCriterion::new()
            .with_target_value(1e-14)
            .with_max_iterations(100),
    )?;

    assert_eq!(result.termination_reason, TerminationReason::TargetReached);
    assert_relative_eq!(result.point[0], 2.0, epsilon = 1e-5);
    assert_relative_eq!(result.point[1], -0.5, epsilon = 1e-5);

    Ok(())
}

#[test]
fn test_evaluation_counts_per_step() -> std::result::Result<(), OptimizerError> {
    let (model, loss) = exponential_problem();
    let model = CountingModel::new(model);
    let loss = CountingLoss::new(loss);

    let mut optimizer = Curveball::new(
        DVector::from_vec(vec![1.0, 0.0]),
        &model,
        &loss,
        true,
        CurveballConfig::default(),
    )?;
    for _ in 0..3 {
        optimizer.step()?;
    }

    let counts = model.counts() + loss.counts();
    assert_eq!(counts.predictions, 6);
    assert_eq!(counts.jvp, 6);
    assert_eq!(counts.vjp, 6);
    assert_eq!(counts.loss, 6);
    assert_eq!(counts.gradient, 3);
    assert_eq!(counts.hvp, 0);

    // A general loss adds two Hessian-vector products per step.
    let rosenbrock = CountingLoss::new(RosenbrockLoss::new(4));
    let mut optimizer = Curveball::new(
        DVector::<f64>::zeros(4),
        IdentityModel::new(4),
        &rosenbrock,
        false,
        CurveballConfig::default(),
    )?;
    optimizer.step()?;
    optimizer.step()?;
    assert_eq!(rosenbrock.counts().hvp, 4);

    Ok(())
}

#[test]
fn test_single_precision() -> std::result::Result<(), OptimizerError> {
    let mut optimizer = Curveball::new(
        DVector::from_vec(vec![0.0f32]),
        IdentityModel::new(1),
        SquaredLoss::new(DVector::from_vec(vec![3.0f32])),
        true,
        CurveballConfig::default(),
    )?;

    for _ in 0..20 {
        optimizer.step()?;
    }
    assert!(optimizer.evaluate()? < 1e-6);
    assert!((optimizer.parameters()[0] - 3.0).abs() < 1e-3);

    Ok(())
}

#[test]
fn test_finite_difference_oracles() -> std::result::Result<(), OptimizerError> {
    // Linear model and a squared loss that the optimizer treats as general,
    // so every derivative comes from finite differences.
    let model = FnModel::new(2, 2, |x: &DVector<f64>| {
        DVector::from_vec(vec![x[0] + x[1], x[0] - x[1]])
    });
    let loss = FnLoss::new(|p: &DVector<f64>| {
        0.5 * ((p[0] - 1.0).powi(2) + (p[1] + 1.0).powi(2))
    })
    .with_input_dim(2);

    let mut optimizer = Curveball::new(
        DVector::from_vec(vec![2.0, 2.0]),
        model,
        loss,
        false,
        CurveballConfig::default(),
    )?;
    for _ in 0..50 {
        optimizer.step()?;
    }

    assert!(optimizer.evaluate()? < 1e-6);
    assert_relative_eq!(optimizer.parameters()[0], 0.0, epsilon = 1e-3);
    assert_relative_eq!(optimizer.parameters()[1], 1.0, epsilon = 1e-3);

    Ok(())
}

/// Model whose predictions disagree with its declared output dimension.
#[derive(Debug)]
struct ShortModel;

impl ForwardModel<f64> for ShortModel {
    fn input_dim(&self) -> usize {
        2
    }

    fn output_dim(&self) -> usize {
        2
    }

    fn predict(&self, x: &DVector<f64>) -> Result<DVector<f64>> {
        Ok(DVector::from_vec(vec![x[0]]))
    }
}

#[test]
fn test_dimension_mismatch_at_step() {
    let mut optimizer = Curveball::new(
        DVector::zeros(2),
        ShortModel,
        SquaredLoss::new(DVector::zeros(2)),
        true,
        CurveballConfig::default(),
    )
    .unwrap();

    let err = optimizer.step().unwrap_err();
    assert!(matches!(
        err,
        OptimizerError::Model(ModelError::DimensionMismatch {
            expected: 2,
            actual: 1,
            ..
        })
    ));
    assert_eq!(optimizer.iteration(), 0);
}

/// `½‖p − t‖² + offset`, whose minimum lies above zero.
#[derive(Debug)]
struct OffsetLoss {
    target: DVector<f64>,
    offset: f64,
}

impl Loss<f64> for OffsetLoss {
    fn value(&self, p: &DVector<f64>) -> Result<f64> {
        Ok(0.5 * (p - &self.target).norm_squared() + self.offset)
    }

    fn gradient(&self, p: &DVector<f64>) -> Result<DVector<f64>> {
        Ok(p - &self.target)
    }

    fn hessian_vector_product(&self, _p: &DVector<f64>, v: &DVector<f64>) -> Result<DVector<f64>> {
        Ok(v.clone())
    }
}

#[test]
fn test_stall_guard_ends_unreachable_threshold() -> std::result::Result<(), OptimizerError> {
    // Starting at the minimizer with zero momentum every step is degenerate,
    // so waiting for loss < 0.5 alone would never end.
    let target = DVector::from_vec(vec![1.0, 2.0]);
    let mut optimizer = Curveball::new(
        target.clone(),
        IdentityModel::new(2),
        OffsetLoss { target, offset: 1.0 },
        false,
        CurveballConfig::default(),
    )?;

    let result = optimizer.optimize(&StoppingCriterion::new().with_target_value(0.5))?;
    assert_eq!(result.termination_reason, TerminationReason::Stalled);
    assert_eq!(result.iterations, 10);
    assert_eq!(result.stalled_steps, 10);
    assert_eq!(result.value, 1.0);

    let outcome = optimizer.step()?;
    assert_eq!(outcome.solve, SolveKind::Degenerate);

    Ok(())
}

/// Stops the run after a fixed number of iterations.
struct StopAfter {
    remaining: usize,
}

impl OptimizationCallback<f64> for StopAfter {
    fn on_iteration_end(&mut self, _info: &IterationInfo<f64>) -> Result<bool> {
        self.remaining = self.remaining.saturating_sub(1);
        Ok(self.remaining > 0)
    }
}

#[test]
fn test_callbacks() -> std::result::Result<(), OptimizerError> {
    let (model, loss) = exponential_problem();
    let mut optimizer = Curveball::new(
        DVector::from_vec(vec![1.0, 0.0]),
        model,
        loss,
        true,
        CurveballConfig::default(),
    )?;

    let mut stop = StopAfter { remaining: 3 };
    let result = optimizer.optimize_with_callback(&StoppingCriterion::new(), &mut stop)?;
    assert_eq!(result.termination_reason, TerminationReason::CallbackRequest);
    assert_eq!(result.iterations, 3);

    // A second run continues from the current state.
    let mut history = LossHistory::new();
    let result = optimizer.optimize_with_callback(
        &StoppingCriterion::new().with_max_iterations(5),
        &mut history,
    )?;
    assert_eq!(result.termination_reason, TerminationReason::MaxIterations);
    assert_eq!(result.iterations, 8);
    assert_eq!(history.values(), result.loss_history.as_slice());
    assert_eq!(history.dampings().len(), 5);

    Ok(())
}

#[test]
fn test_fixed_damping_schedule() -> std::result::Result<(), OptimizerError> {
    let config = CurveballConfig::default().with_damping(DampingConfig::fixed(0.5));
    let mut optimizer = Curveball::new(
        DVector::<f64>::zeros(4),
        IdentityModel::new(4),
        RosenbrockLoss::new(4),
        false,
        config,
    )?;

    for _ in 0..10 {
        let outcome = optimizer.step()?;
        assert_eq!(outcome.damping, 0.5);
    }

    Ok(())
}

#[test]
fn test_damping_adapts_only_on_update_interval() -> std::result::Result<(), OptimizerError> {
    // Equal thresholds make every ratio other than exactly 1 move the damping.
    let damping = DampingConfig::new()
        .with_factors(2.0, 0.5)
        .with_ratio_thresholds(1.0, 1.0)
        .with_update_interval(3);
    let (model, loss) = exponential_problem();
    let mut optimizer = Curveball::new(
        DVector::from_vec(vec![1.0, 0.0]),
        model,
        loss,
        true,
        CurveballConfig::default().with_damping(damping),
    )?;

    for _ in 0..10 {
        let counter = optimizer.iteration();
        let before = optimizer.damping();
        let outcome = optimizer.step()?;

        if counter % 3 == 0 {
            assert!(
                outcome.damping == before * 2.0 || outcome.damping == before * 0.5,
                "step {counter}: damping {before} -> {}",
                outcome.damping
            );
        } else {
            assert_eq!(outcome.damping, before, "step {counter} adapted damping");
        }
    }

    Ok(())
}

/// Squared loss whose Hessian-vector product refuses to evaluate.
#[derive(Debug)]
struct KinkedLoss;

impl Loss<f64> for KinkedLoss {
    fn value(&self, p: &DVector<f64>) -> Result<f64> {
        Ok(0.5 * p.norm_squared())
    }

    fn gradient(&self, p: &DVector<f64>) -> Result<DVector<f64>> {
        Ok(p.clone())
    }

    fn hessian_vector_product(&self, _p: &DVector<f64>, _v: &DVector<f64>) -> Result<DVector<f64>> {
        Err(ModelError::not_differentiable("kink in the loss"))
    }
}

#[test]
fn test_oracle_error_propagates_unchanged() {
    let mut optimizer = Curveball::new(
        DVector::from_vec(vec![1.0, -1.0]),
        IdentityModel::new(2),
        KinkedLoss,
        false,
        CurveballConfig::default(),
    )
    .unwrap();

    let err = optimizer.step().unwrap_err();
    assert!(matches!(
        err,
        OptimizerError::Model(ModelError::NotDifferentiable { ref reason }) if reason == "kink in the loss"
    ));
    assert_eq!(optimizer.iteration(), 0);
    assert_eq!(optimizer.parameters(), &DVector::from_vec(vec![1.0, -1.0]));
    assert_eq!(optimizer.damping(), 1.0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_step_preserves_dimensions_and_bounds(
        (x0, target) in (1usize..5).prop_flat_map(|n| (
            prop::collection::vec(-5.0f64..5.0, n),
            prop::collection::vec(-5.0f64..5.0, n),
        )),
        steps in 1usize..8,
    ) {
        let n = x0.len();
        let mut optimizer = Curveball::new(
            DVector::from_vec(x0),
            IdentityModel::new(n),
            SquaredLoss::new(DVector::from_vec(target)),
            true,
            CurveballConfig::default(),
        ).unwrap();

        for k in 1..=steps {
            let before = optimizer.damping();
            let outcome = optimizer.step().unwrap();

            prop_assert_eq!(outcome.parameters.len(), n);
            prop_assert_eq!(optimizer.momentum().len(), n);
            prop_assert_eq!(optimizer.iteration(), k);
            prop_assert!(outcome.damping > 0.0);
            prop_assert!(outcome.damping <= before * 1.01 * (1.0 + 1e-12));
            prop_assert!(outcome.damping >= before * 0.99 * (1.0 - 1e-12));
        }
    }
}
