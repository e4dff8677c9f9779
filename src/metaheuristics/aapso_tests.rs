use super::*;
use crate::metaheuristics::FnFitness;

/// Rewards the first three features, lightly penalizes subset size.
fn informative(dim: usize) -> FnFitness<impl Fn(&[bool]) -> f64> {
    FnFitness::new(dim, move |mask: &[bool]| {
        let useful = mask.iter().take(3).filter(|&&m| m).count() as f64;
        let selected = mask.iter().filter(|&&m| m).count() as f64;
        0.9 * useful / 3.0 + 0.1 * (1.0 - selected / dim as f64)
    })
}

#[test]
fn test_trace_is_monotone_for_many_seeds() {
    let fitness = informative(12);
    for seed in 0..20 {
        let result = Aapso::new()
            .with_population_size(6)
            .with_max_iter(8)
            .with_seed(seed)
            .optimize(&fitness)
            .expect("valid configuration");

        for w in result.convergence_curve.windows(2) {
            assert!(w[1] >= w[0], "seed {seed}: trace decreased {w:?}");
        }
    }
}

#[test]
fn test_trace_shape_and_final_value() {
    let result = Aapso::new()
        .with_population_size(4)
        .with_max_iter(5)
        .with_seed(7)
        .optimize(&informative(8))
        .expect("valid configuration");

    assert_eq!(result.convergence_curve.len(), 6);
    assert_eq!(
        *result.convergence_curve.last().expect("non-empty"),
        result.best_fitness
    );
    assert_eq!(result.evaluations, 4 * 6);
}

#[test]
fn test_zero_feature_mask_scores_worst_without_calling_fitness() {
    let fitness = FnFitness::new(4, |mask: &[bool]| {
        assert!(mask.iter().any(|&m| m), "empty mask reached the fitness function");
        1.0
    });
    assert_eq!(Aapso::score(&fitness, &[false; 4]), WORST_FITNESS);
    assert_eq!(Aapso::score(&fitness, &[true, false, false, false]), 1.0);
}

#[test]
fn test_mostly_empty_masks_do_not_abort_search() {
    // threshold near 1 leaves almost every agent with no features
    let fitness = FnFitness::new(3, |mask: &[bool]| {
        assert!(mask.iter().any(|&m| m));
        0.5
    });
    let result = Aapso::new()
        .with_population_size(5)
        .with_max_iter(4)
        .with_threshold(0.99)
        .with_seed(3)
        .optimize(&fitness)
        .expect("degenerate agents are not errors");
    assert!(result.best_fitness == WORST_FITNESS || result.best_fitness == 0.5);
}

#[test]
fn test_nan_fitness_is_treated_as_worst() {
    let fitness = FnFitness::new(2, |_: &[bool]| f64::NAN);
    assert_eq!(Aapso::score(&fitness, &[true, true]), WORST_FITNESS);
}

#[test]
fn test_zero_iterations_returns_best_initial_agent() {
    let result = Aapso::new()
        .with_population_size(9)
        .with_max_iter(0)
        .with_seed(11)
        .optimize(&informative(10))
        .expect("valid configuration");

    assert_eq!(result.convergence_curve.len(), 1);
    assert_eq!(result.evaluations, 9);

    let mut best = 0;
    for (i, agent) in result.final_population.iter().enumerate() {
        if agent.fitness > result.final_population[best].fitness {
            best = i;
        }
    }
    assert_eq!(result.best_agent, result.final_population[best]);
    assert_eq!(result.best_fitness, result.final_population[best].fitness);
}

#[test]
fn test_global_best_dominates_every_final_agent() {
    let result = Aapso::new()
        .with_population_size(7)
        .with_max_iter(6)
        .with_seed(5)
        .optimize(&informative(9))
        .expect("valid configuration");

    for agent in &result.final_population {
        assert!(result.best_fitness >= agent.fitness);
        assert!(result.best_fitness >= agent.personal_best_fitness);
        assert!(agent.personal_best_fitness >= agent.fitness);
    }
}

#[test]
fn test_agents_stay_in_unit_cube_with_fixed_dimension() {
    let result = Aapso::new()
        .with_population_size(5)
        .with_max_iter(10)
        .with_exploration(2.0, 1.0)
        .with_seed(9)
        .optimize(&informative(6))
        .expect("valid configuration");

    for agent in &result.final_population {
        assert_eq!(agent.dimension(), 6);
        assert_eq!(agent.velocity.len(), 6);
        assert!(agent.position.iter().all(|p| (0.0..=1.0).contains(p)));
    }
    assert_eq!(result.best_mask.len(), 6);
}

#[test]
fn test_seeded_run_reproduces_best_mask() {
    // P=5, D=10, T=3
    let fitness = informative(10);
    let run = || {
        Aapso::new()
            .with_population_size(5)
            .with_max_iter(3)
            .with_seed(2024)
            .optimize(&fitness)
            .expect("valid configuration")
    };
    let a = run();
    let b = run();
    assert_eq!(a.best_mask, b.best_mask);
    assert_eq!(a.best_fitness, b.best_fitness);
    assert_eq!(a.convergence_curve, b.convergence_curve);
    assert_eq!(a.best_agent.position, b.best_agent.position);
}

#[test]
fn test_finds_informative_features() {
    let result = Aapso::new()
        .with_population_size(20)
        .with_max_iter(30)
        .with_seed(42)
        .optimize(&informative(10))
        .expect("valid configuration");

    let selected = result.selected_indices();
    assert!(selected.contains(&0) && selected.contains(&1) && selected.contains(&2));
    assert!(result.best_fitness > 0.9);
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let fitness = informative(4);
    assert!(Aapso::new().with_population_size(0).optimize(&fitness).is_err());
    assert!(Aapso::new().with_threshold(1.0).optimize(&fitness).is_err());
    assert!(Aapso::new().with_acceleration(0.8, 0.2).optimize(&fitness).is_err());
    assert!(Aapso::new().with_exploration(0.5, 0.0).optimize(&fitness).is_err());

    let empty = FnFitness::new(0, |_: &[bool]| 0.0);
    assert!(Aapso::new().optimize(&empty).is_err());
}
