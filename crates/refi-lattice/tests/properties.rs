//! Property-based tests for lattice valuation invariants.
//!
//! These tests verify properties that must hold for any valid loan:
//! - Intrinsic value rises with the contract rate
//! - Once refinancing is optimal, a higher contract rate keeps it optimal
//! - A costly refinance never beats a free one
//! - The lattice recombines
//! - Root-only and full-tree runs agree
//! - Exercise nodes carry the cost-inclusive balance as liability

use proptest::prelude::*;
use refi_config::{ModelConfig, Retention};
use refi_lattice::lattice::RateLattice;
use refi_lattice::prelude::*;

// =============================================================================
// STRATEGIES
// =============================================================================

fn loan_config() -> impl Strategy<Value = ModelConfig> {
    (
        0.01f64..0.15,  // market rate
        -0.02f64..0.06, // differential
        0.0f64..0.10,   // volatility per period
        0.2f64..0.8,    // up probability
        0.0f64..0.05,   // refinancing cost
        1u32..20,       // steps
    )
        .prop_map(|(market, spread, sigma, p, alpha, steps)| {
            ModelConfig::chen_ling_1989()
                .with_initial_rate(market)
                .with_contract_rate((market + spread).max(0.0))
                .with_volatility(sigma)
                .with_prob_up(p)
                .with_refinancing_cost_pct(alpha)
                .with_time_periods(steps)
        })
}

fn root(config: ModelConfig) -> RootResults {
    RefinancingModel::new(config).unwrap().solve_model().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_intrinsic_value_nondecreasing_in_contract_rate(
        config in loan_config(),
        bump in 0.0f64..0.05,
    ) {
        let low = root(config.clone());
        let high = root(config.clone().with_contract_rate(config.contract_rate + bump));
        prop_assert!(high.g >= low.g - 1e-9);
    }

    #[test]
    fn prop_refinance_region_is_upward_closed(
        config in loan_config(),
        bump in 0.0f64..0.05,
    ) {
        let solver = TriggerRateSolver::new(&config).unwrap();
        let low = solver.evaluate(config.contract_rate, TrialPhase::Scan).unwrap();
        let high = solver
            .evaluate(config.contract_rate + bump, TrialPhase::Scan)
            .unwrap();

        prop_assert!(high.objective() >= low.objective() - 1e-9);
        if low.decision.is_refinance() {
            prop_assert_eq!(high.decision, RefinanceDecision::Refinance);
        }
    }

    #[test]
    fn prop_zero_differential_waits(
        config in loan_config(),
        alpha in 0.001f64..0.05,
    ) {
        let config = config
            .clone()
            .with_contract_rate(config.initial_rate)
            .with_refinancing_cost_pct(alpha);
        let result = root(config);
        prop_assert_eq!(result.decision(), RefinanceDecision::Wait);
        prop_assert!(result.g < 0.0);
    }

    #[test]
    fn prop_free_refinancing_dominates(config in loan_config()) {
        let costly = root(config.clone());
        let free = root(config.with_refinancing_cost_pct(0.0));
        prop_assert!(free.v >= costly.v - 1e-9);
        prop_assert!(free.w >= costly.w - 1e-9);
        prop_assert!(free.g >= costly.g);
    }

    #[test]
    fn prop_root_only_matches_full_tree(config in loan_config()) {
        let full = root(config.clone().with_retention(Retention::FullTree));
        let slim = root(config.with_retention(Retention::RootOnly));
        prop_assert_eq!(full, slim);
    }

    #[test]
    fn prop_node_invariants(config in loan_config()) {
        let alpha = config.refinancing_cost_pct;
        let steps = config.time_periods as usize;
        let mut model = RefinancingModel::new(config).unwrap();
        model.solve_model().unwrap();

        for t in 0..=steps {
            for j in 0..=t {
                let node = model.node_results(t, j).unwrap();
                prop_assert!(node.w >= 0.0);
                if t == steps {
                    prop_assert_eq!(node.w, 0.0);
                    prop_assert_eq!(node.v, node.g);
                } else {
                    prop_assert!(node.v >= node.g && node.v >= node.w);
                }
                if node.decision().is_refinance() {
                    let liability = (1.0 + alpha) * node.balance;
                    prop_assert!((node.m - liability).abs() < 1e-9 * liability.max(1.0));
                }
            }
        }
    }

    #[test]
    fn prop_lattice_recombines(
        config in loan_config(),
        moves in proptest::collection::vec(any::<bool>(), 1..20),
    ) {
        let config = config.with_time_periods(moves.len() as u32);
        let lattice = RateLattice::from_config(&config).unwrap();

        let mut path_rate = lattice.rate_at(0, 0).unwrap();
        for &up in &moves {
            path_rate = lattice.step_rate(path_rate, up);
        }

        let t = moves.len();
        let j = moves.iter().filter(|&&up| up).count();
        let node_rate = lattice.rate_at(t, j).unwrap();
        prop_assert!((path_rate - node_rate).abs() <= 1e-12 * node_rate.abs().max(1e-6));
    }

    #[test]
    fn prop_reach_probabilities_sum_to_one(config in loan_config()) {
        let lattice = RateLattice::from_config(&config).unwrap();
        for t in 0..=lattice.steps() {
            let total: f64 = (0..=t).map(|j| lattice.reach_probability(t, j).unwrap()).sum();
            prop_assert!((total - 1.0).abs() < 1e-12);
        }
    }
}
