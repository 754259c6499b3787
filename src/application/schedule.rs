// ============================================================
// Layer 2 — Epoch Schedule
// ============================================================
// Two states, strictly sequential:
//
//   Validating  — once before any training epoch
//   Training    — once per remaining epoch in resume..epochs
//   Validating  — once after the last epoch
//
// Checkpoints:
//   - after training epoch e, if e is a multiple of the interval
//     (epoch 0 counts: it is saved AFTER its training pass)
//   - once more after the loop, tagged with the configured epoch
//     count, always built from the current state. This holds
//     even when the loop body never ran.
//
// Example: epochs=5, resume=0, interval=5
//   validate, train 0, save 0, train 1..4, save 5, validate

use anyhow::Result;

use crate::domain::traits::TrainingSession;

/// Drive `session` from `resume` up to (not including) `epochs`.
///
/// An `interval` of 0 disables the periodic saves; the final save
/// still happens.
pub fn run_schedule<S: TrainingSession>(
    session:  &mut S,
    resume:   usize,
    epochs:   usize,
    interval: usize,
) -> Result<()> {
    session.validate()?;

    if resume >= epochs {
        tracing::info!(
            "Resume epoch {} has reached the configured {} epochs — nothing to train",
            resume,
            epochs
        );
    }

    for epoch in resume..epochs {
        println!("Epoch: {epoch}/{epochs}...");
        session.train_epoch(epoch, epochs)?;

        if interval > 0 && epoch % interval == 0 {
            session.save_checkpoint(epoch)?;
        }
    }

    session.save_checkpoint(epochs)?;
    session.validate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Validate,
        Train(usize),
        Save(usize),
    }

    #[derive(Default)]
    struct Recorder {
        events:   Vec<Event>,
        fail_at:  Option<usize>,
    }

    impl Recorder {
        fn saves(&self) -> Vec<usize> {
            self.events
                .iter()
                .filter_map(|e| match e { Event::Save(n) => Some(*n), _ => None })
                .collect()
        }

        fn count(&self, wanted: &Event) -> usize {
            self.events.iter().filter(|e| *e == wanted).count()
        }

        fn trained(&self) -> Vec<usize> {
            self.events
                .iter()
                .filter_map(|e| match e { Event::Train(n) => Some(*n), _ => None })
                .collect()
        }
    }

    impl TrainingSession for Recorder {
        fn validate(&mut self) -> Result<()> {
            self.events.push(Event::Validate);
            Ok(())
        }

        fn train_epoch(&mut self, epoch: usize, _total: usize) -> Result<()> {
            if self.fail_at == Some(epoch) {
                anyhow::bail!("shape mismatch in epoch {epoch}");
            }
            self.events.push(Event::Train(epoch));
            Ok(())
        }

        fn save_checkpoint(&mut self, epoch: usize) -> Result<()> {
            self.events.push(Event::Save(epoch));
            Ok(())
        }
    }

    #[test]
    fn test_five_epochs_from_scratch_saves_epoch_zero_and_final() {
        let mut rec = Recorder::default();
        run_schedule(&mut rec, 0, 5, 5).unwrap();

        // epoch 0 is a multiple of 5 and is saved after its training pass
        assert_eq!(rec.saves(), vec![0, 5]);
        assert_eq!(
            &rec.events[..3],
            &[Event::Validate, Event::Train(0), Event::Save(0)]
        );
        assert_eq!(rec.trained(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_resume_starts_at_resume_epoch() {
        let mut rec = Recorder::default();
        run_schedule(&mut rec, 15, 20, 5).unwrap();

        assert_eq!(rec.trained(), vec![15, 16, 17, 18, 19]);
        assert_eq!(rec.saves(), vec![15, 20]);
    }

    #[test]
    fn test_completed_run_trains_nothing_and_validates_twice() {
        let mut rec = Recorder::default();
        run_schedule(&mut rec, 20, 20, 5).unwrap();

        assert_eq!(
            rec.events,
            vec![Event::Validate, Event::Save(20), Event::Validate]
        );
        assert_eq!(rec.count(&Event::Validate), 2);
    }

    #[test]
    fn test_resume_past_configured_epochs() {
        let mut rec = Recorder::default();
        run_schedule(&mut rec, 25, 20, 5).unwrap();

        assert!(rec.trained().is_empty());
        assert_eq!(rec.saves(), vec![20]);
    }

    #[test]
    fn test_full_default_run_checkpoint_epochs() {
        let mut rec = Recorder::default();
        run_schedule(&mut rec, 0, 20, 5).unwrap();

        assert_eq!(rec.saves(), vec![0, 5, 10, 15, 20]);
        assert_eq!(rec.trained().len(), 20);
    }

    #[test]
    fn test_zero_interval_only_saves_final() {
        let mut rec = Recorder::default();
        run_schedule(&mut rec, 0, 3, 0).unwrap();
        assert_eq!(rec.saves(), vec![3]);
    }

    #[test]
    fn test_failure_stops_the_run() {
        let mut rec = Recorder { fail_at: Some(2), ..Recorder::default() };
        let result = run_schedule(&mut rec, 0, 5, 5);

        assert!(result.is_err());
        assert_eq!(rec.trained(), vec![0, 1]);
        // no final save and no second validation after a failure
        assert_eq!(rec.saves(), vec![0]);
        assert_eq!(rec.count(&Event::Validate), 1);
    }
}
