//! Sampling the full course of one infection at exposure time.
use rand::Rng;
use rand_distr::{Distribution, Exp};

use crate::parameters::ParametersValues;
use crate::transition::TransitionType;

/// Waiting-time rates for one age group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiseaseRates {
    pub tau: f64,
    pub kappa: f64,
    /// Fixed treatable window, in days
    pub chi: f64,
    pub gamma: f64,
    pub nu: f64,
}

impl DiseaseRates {
    #[must_use]
    pub fn for_age(parameters: &ParametersValues, age: usize) -> Self {
        DiseaseRates {
            tau: parameters.tau(),
            kappa: parameters.kappa(),
            chi: parameters.treatable_period,
            gamma: parameters.gamma(),
            nu: parameters.nu(age),
        }
    }
}

/// Draws an exponential waiting time; a non-positive rate never fires
pub fn sample_exponential<R: Rng>(rate: f64, rng: &mut R) -> f64 {
    if rate <= 0.0 || !rate.is_finite() {
        return f64::INFINITY;
    }
    match Exp::new(rate) {
        Ok(exp) => exp.sample(rng),
        Err(_) => f64::INFINITY,
    }
}

/// Competing event times for one exposed individual
///
/// Every time is drawn once, when the schedule is created. Whichever
/// competing time is earliest decides the next state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schedule {
    pub exposed_at: f64,
    pub ta: f64,
    pub tt: f64,
    pub ti: f64,
    pub tr_a: f64,
    pub td_a: f64,
    pub tr_ti: f64,
    pub td_ti: f64,
}

/// One step of a schedule: the transition, when its state was entered, and when it fires
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledTransition {
    pub transition: TransitionType,
    pub initialization_time: f64,
    pub time: f64,
}

impl Schedule {
    pub fn sample<R: Rng>(now: f64, rates: &DiseaseRates, rng: &mut R) -> Self {
        let ta = now + sample_exponential(rates.tau, rng);
        let tt = ta + sample_exponential(rates.kappa, rng);
        let ti = tt + rates.chi;
        let tr_a = ta + sample_exponential(rates.gamma, rng);
        let tr_ti = tt + sample_exponential(rates.gamma, rng);
        let td_a = ta + sample_exponential(rates.nu, rng);
        let td_ti = tt + sample_exponential(rates.nu, rng);
        Schedule {
            exposed_at: now,
            ta,
            tt,
            ti,
            tr_a,
            td_a,
            tr_ti,
            td_ti,
        }
    }

    /// The chain of transitions from exposure to recovery or death
    #[must_use]
    pub fn transitions(&self) -> Vec<ScheduledTransition> {
        let step = |transition, initialization_time, time| ScheduledTransition {
            transition,
            initialization_time,
            time,
        };
        let mut chain = vec![step(TransitionType::EtoA, self.exposed_at, self.ta)];

        if self.tt < self.tr_a && self.tt < self.td_a {
            chain.push(step(TransitionType::AtoT, self.ta, self.tt));
            if self.ti < self.tr_ti && self.ti < self.td_ti {
                chain.push(step(TransitionType::TtoI, self.tt, self.ti));
                // The recovery and death draws made at Tt carry through
                if self.tr_ti < self.td_ti {
                    chain.push(step(TransitionType::ItoR, self.ti, self.tr_ti));
                } else {
                    chain.push(step(TransitionType::ItoD, self.ti, self.td_ti));
                }
            } else if self.tr_ti < self.td_ti {
                chain.push(step(TransitionType::TtoR, self.tt, self.tr_ti));
            } else {
                chain.push(step(TransitionType::TtoD, self.tt, self.td_ti));
            }
        } else if self.tr_a < self.td_a {
            chain.push(step(TransitionType::AtoR, self.ta, self.tr_a));
        } else {
            chain.push(step(TransitionType::AtoD, self.ta, self.td_a));
        }
        chain
    }

    /// Start of the infected window
    #[must_use]
    pub fn infected_from(&self) -> f64 {
        self.ta
    }

    /// End of the infected window: the time of recovery or death
    #[must_use]
    pub fn infected_until(&self) -> f64 {
        self.transitions()
            .last()
            .map_or(self.ta, |terminal| terminal.time)
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;
    use crate::transition::Compartment;

    fn rates() -> DiseaseRates {
        DiseaseRates::for_age(&ParametersValues::default(), 2)
    }

    #[test]
    fn chains_are_monotone_and_terminal() {
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..1000 {
            let schedule = Schedule::sample(3.5, &rates(), &mut rng);
            let chain = schedule.transitions();
            assert_eq!(chain[0].transition, TransitionType::EtoA);
            let mut previous = schedule.exposed_at;
            for step in &chain {
                assert!(step.time >= previous);
                assert!(step.time >= step.initialization_time);
                assert_eq!(step.initialization_time, previous);
                previous = step.time;
            }
            let terminal = chain.last().unwrap().transition.destination();
            assert!(terminal.is_terminal());
            for pair in chain.windows(2) {
                assert_eq!(pair[0].transition.destination(), pair[1].transition.source());
            }
            assert_eq!(schedule.infected_until(), previous);
        }
    }

    #[test]
    fn fixed_treatable_window() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..1000 {
            let schedule = Schedule::sample(0.0, &rates(), &mut rng);
            assert!((schedule.ti - schedule.tt - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn infectious_terminal_reuses_treatable_draws() {
        let schedule = Schedule {
            exposed_at: 0.0,
            ta: 1.0,
            tt: 2.0,
            ti: 3.0,
            tr_a: 5.0,
            td_a: f64::INFINITY,
            tr_ti: 6.0,
            td_ti: 4.0,
        };
        let chain = schedule.transitions();
        let kinds: Vec<_> = chain.iter().map(|step| step.transition).collect();
        assert_eq!(
            kinds,
            vec![
                TransitionType::EtoA,
                TransitionType::AtoT,
                TransitionType::TtoI,
                TransitionType::ItoD
            ]
        );
        assert_eq!(chain[3].time, 4.0);
        assert_eq!(chain[3].initialization_time, 3.0);
    }

    #[test]
    fn no_mortality_means_no_deaths() {
        let mut parameters = ParametersValues::default();
        parameters.case_fatality_rates = vec![0.0; 5];
        let rates = DiseaseRates::for_age(&parameters, 0);
        assert_eq!(rates.nu, 0.0);
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..500 {
            let chain = Schedule::sample(0.0, &rates, &mut rng).transitions();
            assert_eq!(
                chain.last().unwrap().transition.destination(),
                Compartment::Recovered
            );
        }
    }

    #[test]
    fn non_positive_rate_never_fires() {
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(sample_exponential(0.0, &mut rng), f64::INFINITY);
        assert_eq!(sample_exponential(-1.0, &mut rng), f64::INFINITY);
        assert!(sample_exponential(2.0, &mut rng).is_finite());
    }
}
