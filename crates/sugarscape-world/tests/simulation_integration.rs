use std::collections::HashSet;
use std::path::PathBuf;
use sugarscape_core::{AgentKind, Error, Good, Landscape, ModelConfig, NeighborMode, Position};
use sugarscape_world::{MetricsCollector, Simulation, TraderTraits};

fn map_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/sugar-map.txt")
}

fn small_config(seed: u64) -> ModelConfig {
    ModelConfig {
        width: 20,
        height: 20,
        initial_population: 60,
        seed,
        log_interval: 0,
        ..Default::default()
    }
}

fn hills() -> Landscape {
    let rows = (0..20)
        .map(|y| (0..20).map(|x| ((x + y) % 5) as f64).collect())
        .collect();
    Landscape::from_rows(rows).unwrap()
}

#[test]
fn test_same_seed_same_history() {
    let mut a = Simulation::new(small_config(7), &hills()).unwrap();
    let mut b = Simulation::new(small_config(7), &hills()).unwrap();

    for _ in 0..30 {
        assert_eq!(a.step().unwrap(), b.step().unwrap());
    }
    let traders_a: Vec<_> = a.traders().cloned().collect();
    let traders_b: Vec<_> = b.traders().cloned().collect();
    assert_eq!(traders_a, traders_b);
}

#[test]
fn test_invariants_hold_every_tick() {
    let mut sim = Simulation::new(small_config(11), &hills()).unwrap();

    for _ in 0..40 {
        let report = sim.step().unwrap();
        assert!(sim.check_invariants().is_ok());
        assert_eq!(report.traders, sim.trader_count());

        for good in [Good::Sugar, Good::Spice] {
            for cell in sim.scheduler().resources(good) {
                assert!(cell.amount >= 0.0);
                assert!(cell.amount <= cell.max_amount);
            }
        }

        let mut occupied = HashSet::new();
        for trader in sim.traders() {
            assert!(!trader.is_depleted());
            assert!(trader.sugar >= 0.0 && trader.spice >= 0.0);
            assert!(occupied.insert(trader.position), "two traders share {}", trader.position);
            assert_eq!(sim.grid().trader_at(trader.position), Some(trader.id));
        }

        if let Some(price) = report.price_gmean {
            assert!(price.is_finite() && price > 0.0);
            assert!(report.trades > 0);
        }
        assert!(report.trade_volume <= report.trades);
    }
}

#[test]
fn test_adjacent_traders_converge() {
    let config = ModelConfig {
        width: 10,
        height: 10,
        torus: false,
        initial_population: 0,
        capacity_baseline: 0.0,
        sugar_noise_sigma: 0.0,
        spice_noise_sigma: 0.0,
        ..Default::default()
    };
    let mut sim = Simulation::new(config, &Landscape::uniform(10, 10, 0.0)).unwrap();
    assert_eq!(sim.scheduler().count(AgentKind::Sugar), 0);

    let traits = |sugar, spice| TraderTraits {
        sugar,
        spice,
        metabolism_sugar: 1.0,
        metabolism_spice: 1.0,
        vision: 1,
        neighbor_mode: NeighborMode::VonNeumann,
    };
    let a = sim.spawn_trader(Position::new(4, 4), traits(10.0, 1.0)).unwrap();
    let b = sim.spawn_trader(Position::new(5, 4), traits(1.0, 10.0)).unwrap();
    let gap_before = (sim.trader(a).unwrap().mrs() - sim.trader(b).unwrap().mrs()).abs();

    let report = sim.step().unwrap();
    assert_eq!(report.deaths, 0);
    assert_eq!(report.trade_volume, 1);
    assert_eq!(report.trades, 4);
    assert!((report.price_gmean.unwrap() - 1.0).abs() < 1e-9);

    let ta = sim.trader(a).unwrap();
    let tb = sim.trader(b).unwrap();
    assert_eq!(ta.position, Position::new(4, 4));
    assert_eq!(tb.position, Position::new(5, 4));
    // traded 4 lots to (6, 5) and (5, 6), then one tick of metabolism
    assert_eq!((ta.sugar, ta.spice), (5.0, 4.0));
    assert_eq!((tb.sugar, tb.spice), (4.0, 5.0));
    assert!(ta.current_welfare() > 10f64.sqrt());
    assert!((ta.mrs() - tb.mrs()).abs() < gap_before);

    // the initiator alone logs the trades
    let partners = sim.trade_partners();
    let logged: usize = partners.values().map(Vec::len).sum();
    assert_eq!(logged, 4);
}

#[test]
fn test_population_dies_out_on_barren_land() {
    let config = ModelConfig {
        width: 10,
        height: 10,
        initial_population: 30,
        capacity_baseline: 0.0,
        sugar_noise_sigma: 0.0,
        spice_noise_sigma: 0.0,
        log_interval: 0,
        ..Default::default()
    };
    let mut sim = Simulation::new(config, &Landscape::uniform(10, 10, 0.0)).unwrap();
    let mut collector = MetricsCollector::new();

    // no regrowth and integer stocks: every live trader burns at least one unit a tick
    let summary = sim.run(200, &mut collector).unwrap();
    assert_eq!(summary.final_traders, 0);
    assert_eq!(summary.total_deaths, 30);
    assert_eq!(sim.grid().agent_count(), 0);
    assert_eq!(collector.latest().map(|r| r.traders), Some(0));
}

#[test]
fn test_loads_bundled_map() {
    let config = ModelConfig {
        seed: 5,
        log_interval: 0,
        ..Default::default()
    };
    let mut sim = Simulation::from_map_file(config, map_path()).unwrap();
    assert_eq!(sim.trader_count(), 200);
    assert!(sim.sugar_capacity_max() >= 4.0);

    let mut collector = MetricsCollector::new();
    let summary = sim.run(10, &mut collector).unwrap();
    assert_eq!(summary.ticks, 10);
    assert_eq!(collector.model_vars().len(), 10);

    let dir = std::env::temp_dir().join(format!("sugarscape-it-{}", std::process::id()));
    collector.export(&dir).unwrap();
    let model = std::fs::read_to_string(dir.join("model_vars.csv")).unwrap();
    assert_eq!(model.lines().count(), 11);
    assert!(dir.join("agent_vars.csv").exists());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_missing_map_is_reported() {
    let result = Simulation::from_map_file(ModelConfig::default(), "/nonexistent/sugar-map.txt");
    assert!(matches!(result, Err(Error::LandscapeNotFound(_))));
}

#[test]
fn test_invalid_setup_is_rejected() {
    let bad_dims = ModelConfig {
        width: 0,
        ..Default::default()
    };
    assert!(matches!(
        Simulation::new(bad_dims, &Landscape::uniform(1, 1, 0.0)),
        Err(Error::Config(_))
    ));

    let mismatch = ModelConfig {
        width: 10,
        height: 10,
        initial_population: 5,
        ..Default::default()
    };
    assert!(matches!(
        Simulation::new(mismatch, &Landscape::uniform(5, 5, 1.0)),
        Err(Error::Config(_))
    ));

    let crowded = ModelConfig {
        width: 3,
        height: 3,
        vision_min: 1,
        vision_max: 1,
        initial_population: 10,
        ..Default::default()
    };
    assert!(matches!(
        Simulation::new(crowded, &Landscape::uniform(3, 3, 1.0)),
        Err(Error::Config(_))
    ));
}
