#[derive(Debug, Clone, PartialEq)]
pub struct PlanWeek {
    pub week: u32,
    pub target_km: f64,
    pub easy_km: u32,
    pub quality_km: u32,
    pub long_km: u32,
    pub recovery_km: u32,
}

/// Linear build from 70 % to 100 % of the goal weekly volume, split over four runs.
/// Returns `None` for fewer than one week or a non-finite volume.
pub fn generate_plan(weeks: u32, weekly_km: f64) -> Option<Vec<PlanWeek>> {
    if weeks < 1 || !weekly_km.is_finite() {
        return None;
    }

    let ramp_weeks = weeks.saturating_sub(1).max(1) as f64;
    let plan = (1..=weeks)
        .map(|week| {
            let multiplier = 0.7 + 0.3 * (week - 1) as f64 / ramp_weeks;
            let target_km = (weekly_km * multiplier * 10.).round() / 10.;
            let share = |fraction: f64| (target_km * fraction).round().max(0.) as u32;

            PlanWeek {
                week,
                target_km,
                easy_km: share(0.4),
                quality_km: share(0.25),
                long_km: share(0.2),
                recovery_km: share(0.15),
            }
        })
        .collect();

    Some(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramps_to_goal() {
        let plan = generate_plan(4, 40.).unwrap();
        let targets: Vec<f64> = plan.iter().map(|w| w.target_km).collect();
        assert_eq!(targets, vec![28., 32., 36., 40.]);

        let last = &plan[3];
        assert_eq!((last.easy_km, last.quality_km, last.long_km, last.recovery_km), (16, 10, 8, 6));
    }

    #[test]
    fn single_week_is_seventy_percent() {
        let plan = generate_plan(1, 30.).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].target_km, 21.);
    }

    #[test]
    fn rejects_invalid_input() {
        assert_eq!(generate_plan(0, 30.), None);
        assert_eq!(generate_plan(3, f64::NAN), None);
    }
}
