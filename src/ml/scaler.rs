// ============================================================
// Layer 5 — Dynamic Loss Scaler
// ============================================================
// Small gradients underflow in low precision. Multiplying the
// loss by a large factor before backward keeps them
// representable; dividing the gradients by the same factor
// afterwards restores their true size.
//
// Call protocol per batch:
//
//   let scaled = scaler.scale(loss);          // loss × S
//   let grads  = scaled.backward();
//   model      = scaler.step(optim, lr, model, grads);
//   scaler.update();
//
// `step` unscales every gradient (× 1/S). If any of them is
// inf/NaN the optimizer step is skipped and the model is
// returned unchanged.
//
// `update` adjusts S:
//   - overflow in this step       → S × 0.5
//   - 2000 clean steps in a row   → S × 2.0
//
// A disabled scaler keeps S = 1 and always steps.

use std::marker::PhantomData;

use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

const INITIAL_SCALE:   f64   = 65536.0; // 2^16
const GROWTH_FACTOR:   f64   = 2.0;
const BACKOFF_FACTOR:  f64   = 0.5;
const GROWTH_INTERVAL: usize = 2000;

#[derive(Debug, Clone)]
pub struct LossScaler {
    enabled:        bool,
    scale:          f64,
    growth_tracker: usize,
    found_inf:      bool,
    skipped_steps:  usize,
}

impl Default for LossScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl LossScaler {
    pub fn new() -> Self {
        Self::with_initial_scale(INITIAL_SCALE)
    }

    pub fn with_initial_scale(scale: f64) -> Self {
        Self {
            enabled:        true,
            scale,
            growth_tracker: 0,
            found_inf:      false,
            skipped_steps:  0,
        }
    }

    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::with_initial_scale(1.0) }
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale
    }

    /// Total optimizer steps skipped because of non-finite gradients.
    pub fn skipped_steps(&self) -> usize {
        self.skipped_steps
    }

    pub fn scale<B: Backend>(&self, loss: Tensor<B, 1>) -> Tensor<B, 1> {
        if self.enabled {
            loss.mul_scalar(self.scale)
        } else {
            loss
        }
    }

    /// Unscale `grads` and apply the optimizer, unless they overflowed.
    pub fn step<B, M, O>(&mut self, optim: &mut O, lr: f64, model: M, mut grads: GradientsParams) -> M
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        if !self.enabled {
            return optim.step(lr, model, grads);
        }

        let mut unscaler = GradUnscaler::<B> {
            grads:     &mut grads,
            inv_scale: 1.0 / self.scale,
            magnitude: None,
            _backend:  PhantomData,
        };
        model.visit(&mut unscaler);

        // one device → host read per step
        let finite = match unscaler.magnitude {
            Some(total) => total.into_scalar().elem::<f64>().is_finite(),
            None => true,
        };

        if !finite {
            self.found_inf      = true;
            self.skipped_steps += 1;
            tracing::warn!("Non-finite gradients at loss scale {}, skipping optimizer step", self.scale);
            return model;
        }

        optim.step(lr, model, grads)
    }

    /// Adjust the scale after a step.
    pub fn update(&mut self) {
        if !self.enabled {
            return;
        }

        if self.found_inf {
            self.scale          *= BACKOFF_FACTOR;
            self.growth_tracker  = 0;
            tracing::debug!("Loss scale reduced to {}", self.scale);
        } else {
            self.growth_tracker += 1;
            if self.growth_tracker == GROWTH_INTERVAL {
                self.scale          *= GROWTH_FACTOR;
                self.growth_tracker  = 0;
                tracing::debug!("Loss scale increased to {}", self.scale);
            }
        }

        self.found_inf = false;
    }
}

// Walks every float parameter of the model, rescales its gradient
// in place and sums |grad| over all of them on the device. Any
// inf/NaN gradient makes the sum non-finite.
struct GradUnscaler<'a, B: AutodiffBackend> {
    grads:     &'a mut GradientsParams,
    inv_scale: f64,
    magnitude: Option<Tensor<B::InnerBackend, 1>>,
    _backend:  PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradUnscaler<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) else {
            return;
        };
        let grad = grad.mul_scalar(self.inv_scale);

        let sum = grad.clone().abs().sum();
        self.magnitude = Some(match self.magnitude.take() {
            Some(total) => total + sum,
            None => sum,
        });

        self.grads.register::<B::InnerBackend, D>(id, grad);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        nn::{Linear, LinearConfig},
        optim::AdamConfig,
    };

    type B = Autodiff<NdArray>;

    fn weights(model: &Linear<B>) -> Vec<f32> {
        model.weight.val().into_data().to_vec().unwrap()
    }

    fn run_step(scaler: &mut LossScaler) -> (Vec<f32>, Vec<f32>) {
        let device = Default::default();
        let model: Linear<B> = LinearConfig::new(4, 2).init(&device);
        let mut optim = AdamConfig::new().init::<B, Linear<B>>();
        let before = weights(&model);

        let input = Tensor::<B, 2>::ones([3, 4], &device);
        let loss  = model.forward(input).mean();
        let grads = scaler.scale(loss).backward();
        let grads = GradientsParams::from_grads(grads, &model);

        let model = scaler.step(&mut optim, 1e-2, model, grads);
        scaler.update();
        (before, weights(&model))
    }

    #[test]
    fn test_initial_scale() {
        assert_eq!(LossScaler::new().scale_factor(), 65536.0);
        assert_eq!(LossScaler::disabled().scale_factor(), 1.0);
    }

    #[test]
    fn test_overflow_halves_scale() {
        let mut scaler = LossScaler::new();
        scaler.found_inf = true;
        scaler.update();
        assert_eq!(scaler.scale_factor(), 32768.0);
    }

    #[test]
    fn test_growth_after_interval() {
        let mut scaler = LossScaler::new();
        for _ in 0..GROWTH_INTERVAL - 1 {
            scaler.update();
        }
        assert_eq!(scaler.scale_factor(), 65536.0);
        scaler.update();
        assert_eq!(scaler.scale_factor(), 131072.0);
    }

    #[test]
    fn test_disabled_scaler_never_changes() {
        let mut scaler = LossScaler::disabled();
        scaler.found_inf = true;
        scaler.update();
        assert_eq!(scaler.scale_factor(), 1.0);
    }

    #[test]
    fn test_finite_step_updates_weights() {
        let mut scaler = LossScaler::new();
        let (before, after) = run_step(&mut scaler);
        assert_ne!(before, after);
        assert_eq!(scaler.skipped_steps(), 0);
        assert_eq!(scaler.scale_factor(), 65536.0);
    }

    #[test]
    fn test_one_nan_gradient_among_many_is_detected() {
        let device = Default::default();
        let model: Linear<B> = LinearConfig::new(4, 2).init(&device);
        let mut optim  = AdamConfig::new().init::<B, Linear<B>>();
        let mut scaler = LossScaler::new();
        let before = weights(&model);

        let loss  = model.forward(Tensor::<B, 2>::ones([3, 4], &device)).mean();
        let grads = scaler.scale(loss).backward();
        let mut grads = GradientsParams::from_grads(grads, &model);

        // poison the bias gradient only; the weight gradient stays finite
        let bias_id = model.bias.as_ref().unwrap().id;
        let bias    = grads.remove::<NdArray, 1>(bias_id).unwrap();
        grads.register::<NdArray, 1>(bias_id, bias.add_scalar(f32::NAN));

        let model = scaler.step(&mut optim, 1e-2, model, grads);
        assert_eq!(weights(&model), before);
        assert_eq!(scaler.skipped_steps(), 1);
    }

    #[test]
    fn test_overflow_skips_step() {
        let mut scaler = LossScaler::with_initial_scale(f64::INFINITY);
        let (before, after) = run_step(&mut scaler);
        assert_eq!(before, after);
        assert_eq!(scaler.skipped_steps(), 1);
    }
}
