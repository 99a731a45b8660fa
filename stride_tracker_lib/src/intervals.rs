use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub label: String,
    pub seconds: u64,
}

/// Warmup, alternating work and rest, then cooldown. Durations are given in minutes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalPlan {
    pub phases: Vec<Phase>,
}

impl IntervalPlan {
    pub fn new(
        warmup_min: u64,
        work_min: u64,
        rest_min: u64,
        reps: u32,
        cooldown_min: u64,
    ) -> Self {
        let mut phases = Vec::new();
        let mut push = |label: String, minutes: u64| {
            phases.push(Phase { label, seconds: minutes * 60 })
        };

        if warmup_min > 0 {
            push("Warmup".into(), warmup_min);
        }
        for i in 1..=reps {
            push(format!("Work {i}/{reps}"), work_min);
            // No rest after the last repetition
            if rest_min > 0 && i < reps {
                push(format!("Rest {i}/{reps}"), rest_min);
            }
        }
        if cooldown_min > 0 {
            push("Cooldown".into(), cooldown_min);
        }

        Self { phases }
    }

    pub fn total_seconds(&self) -> u64 {
        self.phases.iter().map(|phase| phase.seconds).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntervalEvent {
    PhaseStarted { label: String, seconds: u64 },
    /// The running phase hit zero. Followed by the next `PhaseStarted` or `Completed`.
    Switch,
    Completed,
}

/// Counts phases down one tick (second) at a time.
#[derive(Debug, Default)]
pub struct IntervalTimer {
    queue: VecDeque<Phase>,
    current: Option<(String, u64)>,
    stopped: bool,
}

impl IntervalTimer {
    /// Starts the plan and returns the events of its first step.
    pub fn start(plan: IntervalPlan) -> (Self, Vec<IntervalEvent>) {
        let mut timer = Self {
            queue: plan.phases.into(),
            current: None,
            stopped: false,
        };
        let mut events = Vec::new();
        timer.next_phase(&mut events);
        (timer, events)
    }

    pub fn current(&self) -> Option<(&str, u64)> {
        self.current.as_ref().map(|(label, left)| (label.as_str(), *left))
    }

    pub fn is_finished(&self) -> bool {
        self.stopped || (self.current.is_none() && self.queue.is_empty())
    }

    pub fn stop(&mut self) {
        self.stopped = true;
        self.current = None;
        self.queue.clear();
    }

    pub fn tick(&mut self) -> Vec<IntervalEvent> {
        let mut events = Vec::new();
        let Some((_, left)) = self.current.as_mut() else {
            return events;
        };

        *left = left.saturating_sub(1);
        if *left == 0 {
            events.push(IntervalEvent::Switch);
            self.next_phase(&mut events);
        }
        events
    }

    fn next_phase(&mut self, events: &mut Vec<IntervalEvent>) {
        match self.queue.pop_front() {
            Some(phase) => {
                events.push(IntervalEvent::PhaseStarted {
                    label: phase.label.clone(),
                    seconds: phase.seconds,
                });
                self.current = Some((phase.label, phase.seconds));
            }
            None => {
                self.current = None;
                events.push(IntervalEvent::Completed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn labels(plan: &IntervalPlan) -> Vec<&str> {
        plan.phases.iter().map(|phase| phase.label.as_str()).collect()
    }

    #[test]
    fn builds_full_plan() {
        let plan = IntervalPlan::new(10, 3, 2, 3, 5);
        assert_eq!(
            labels(&plan),
            vec!["Warmup", "Work 1/3", "Rest 1/3", "Work 2/3", "Rest 2/3", "Work 3/3", "Cooldown"]
        );
        assert_eq!(plan.total_seconds(), (10 + 9 + 4 + 5) * 60);
    }

    #[test]
    fn skips_empty_phases() {
        let plan = IntervalPlan::new(0, 1, 0, 2, 0);
        assert_eq!(labels(&plan), vec!["Work 1/2", "Work 2/2"]);
    }

    #[test]
    fn counts_down_and_completes() {
        let plan = IntervalPlan {
            phases: vec![
                Phase { label: "A".into(), seconds: 2 },
                Phase { label: "B".into(), seconds: 1 },
            ],
        };

        let (mut timer, events) = IntervalTimer::start(plan);
        assert_eq!(events, vec![IntervalEvent::PhaseStarted { label: "A".into(), seconds: 2 }]);

        assert!(timer.tick().is_empty());
        assert_eq!(timer.current(), Some(("A", 1)));

        assert_eq!(
            timer.tick(),
            vec![
                IntervalEvent::Switch,
                IntervalEvent::PhaseStarted { label: "B".into(), seconds: 1 },
            ]
        );
        assert_eq!(timer.tick(), vec![IntervalEvent::Switch, IntervalEvent::Completed]);
        assert!(timer.is_finished());
        assert!(timer.tick().is_empty());
    }

    #[test]
    fn empty_plan_completes_immediately() {
        let (timer, events) = IntervalTimer::start(IntervalPlan::new(0, 0, 0, 0, 0));
        assert_eq!(events, vec![IntervalEvent::Completed]);
        assert!(timer.is_finished());
    }

    #[test]
    fn stop_cancels() {
        let (mut timer, _) = IntervalTimer::start(IntervalPlan::new(1, 1, 1, 2, 1));
        timer.stop();
        assert!(timer.is_finished());
        assert!(timer.tick().is_empty());
    }
}
