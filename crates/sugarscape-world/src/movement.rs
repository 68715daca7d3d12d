//! Welfare-seeking movement policy.

use crate::grid::Grid;
use crate::scheduler::Scheduler;
use crate::trader::Trader;
use rand::seq::SliceRandom;
use rand::Rng;
use sugarscape_core::{is_close, Good, Position};

const WELFARE_REL_TOL: f64 = 1e-9;

/// Current stock of `good` at `pos`, zero where the cell has none.
pub fn resource_at(grid: &Grid, scheduler: &Scheduler, good: Good, pos: Position) -> f64 {
    grid.cell_contents(pos)
        .get(good.kind())
        .and_then(|id| scheduler.resource(good, id))
        .map(|cell| cell.amount)
        .unwrap_or(0.0)
}

/// Pick where `trader` moves this tick.
///
/// Candidates are the cells within vision not held by another trader (the
/// trader's own cell included). Keep those with maximal post-harvest welfare,
/// then those nearest the trader, then choose uniformly. `wrap` selects the
/// distance used for the nearest-cell filter.
pub fn choose_destination<R: Rng + ?Sized>(
    trader: &Trader,
    grid: &Grid,
    scheduler: &Scheduler,
    wrap: Option<(i32, i32)>,
    rng: &mut R,
) -> Option<Position> {
    let candidates: Vec<Position> = grid
        .neighborhood(trader.position, trader.neighbor_mode, true, trader.vision)
        .into_iter()
        .filter(|pos| grid.trader_at(*pos).map_or(true, |other| other == trader.id))
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let welfares: Vec<f64> = candidates
        .iter()
        .map(|pos| {
            trader.welfare(
                trader.sugar + resource_at(grid, scheduler, Good::Sugar, *pos),
                trader.spice + resource_at(grid, scheduler, Good::Spice, *pos),
            )
        })
        .collect();
    let best = welfares.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let best_cells: Vec<Position> = candidates
        .iter()
        .zip(&welfares)
        .filter(|(_, w)| is_close(**w, best, WELFARE_REL_TOL, 0.0))
        .map(|(pos, _)| *pos)
        .collect();

    let distance = |pos: &Position| trader.position.grid_distance(pos, trader.neighbor_mode, wrap);
    let nearest = best_cells.iter().map(distance).min()?;
    let finals: Vec<Position> = best_cells
        .into_iter()
        .filter(|pos| distance(pos) == nearest)
        .collect();

    finals.choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceCell;
    use crate::trader::TraderTraits;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use sugarscape_core::{AgentId, AgentKind, NeighborMode};

    struct Fixture {
        grid: Grid,
        scheduler: Scheduler,
    }

    impl Fixture {
        fn new(width: i32, height: i32, torus: bool) -> Self {
            Self {
                grid: Grid::new(width, height, torus),
                scheduler: Scheduler::new(),
            }
        }

        fn resource(&mut self, good: Good, pos: Position, amount: f64) {
            let id = self.scheduler.next_id();
            self.grid.place(id, good.kind(), pos).unwrap();
            self.scheduler
                .add_resource(ResourceCell::new(id, good, pos, amount))
                .unwrap();
        }

        fn trader(&mut self, pos: Position, vision: i32, mode: NeighborMode) -> Trader {
            let id = self.scheduler.next_id();
            self.grid.place(id, AgentKind::Trader, pos).unwrap();
            Trader::new(
                id,
                pos,
                TraderTraits {
                    sugar: 2.0,
                    spice: 2.0,
                    metabolism_sugar: 1.0,
                    metabolism_spice: 1.0,
                    vision,
                    neighbor_mode: mode,
                },
            )
        }
    }

    #[test]
    fn test_moves_to_richest_cell() {
        let mut fx = Fixture::new(10, 10, false);
        fx.resource(Good::Sugar, Position::new(7, 5), 4.0);
        fx.resource(Good::Spice, Position::new(7, 5), 4.0);
        fx.resource(Good::Sugar, Position::new(5, 3), 9.0);
        let trader = fx.trader(Position::new(5, 5), 2, NeighborMode::VonNeumann);

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let dest = choose_destination(&trader, &fx.grid, &fx.scheduler, None, &mut rng);
        // (2+4)(2+4) = 36 beats (2+9)*2 = 22
        assert_eq!(dest, Some(Position::new(7, 5)));
    }

    #[test]
    fn test_stays_when_nothing_is_better() {
        let mut fx = Fixture::new(10, 10, false);
        let trader = fx.trader(Position::new(5, 5), 3, NeighborMode::Moore);

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let dest = choose_destination(&trader, &fx.grid, &fx.scheduler, None, &mut rng);
        assert_eq!(dest, Some(Position::new(5, 5)));
    }

    #[test]
    fn test_prefers_nearest_of_equal_cells() {
        let mut fx = Fixture::new(10, 10, false);
        fx.resource(Good::Sugar, Position::new(5, 6), 3.0);
        fx.resource(Good::Spice, Position::new(5, 6), 3.0);
        fx.resource(Good::Sugar, Position::new(5, 8), 3.0);
        fx.resource(Good::Spice, Position::new(5, 8), 3.0);
        let trader = fx.trader(Position::new(5, 5), 3, NeighborMode::VonNeumann);

        for seed in 0..10 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let dest = choose_destination(&trader, &fx.grid, &fx.scheduler, None, &mut rng);
            assert_eq!(dest, Some(Position::new(5, 6)));
        }
    }

    #[test]
    fn test_random_tie_break_covers_all_nearest() {
        let mut fx = Fixture::new(10, 10, false);
        for pos in [Position::new(4, 5), Position::new(6, 5)] {
            fx.resource(Good::Sugar, pos, 3.0);
            fx.resource(Good::Spice, pos, 3.0);
        }
        let trader = fx.trader(Position::new(5, 5), 1, NeighborMode::VonNeumann);

        let mut seen = std::collections::HashSet::new();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..64 {
            let dest = choose_destination(&trader, &fx.grid, &fx.scheduler, None, &mut rng);
            seen.insert(dest.unwrap());
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_skips_cells_held_by_other_traders() {
        let mut fx = Fixture::new(10, 10, false);
        fx.resource(Good::Sugar, Position::new(5, 6), 9.0);
        fx.resource(Good::Spice, Position::new(5, 6), 9.0);
        fx.resource(Good::Sugar, Position::new(5, 4), 1.0);
        fx.resource(Good::Spice, Position::new(5, 4), 1.0);
        let trader = fx.trader(Position::new(5, 5), 1, NeighborMode::VonNeumann);
        fx.grid.place(AgentId(999), AgentKind::Trader, Position::new(5, 6)).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let dest = choose_destination(&trader, &fx.grid, &fx.scheduler, None, &mut rng);
        assert_eq!(dest, Some(Position::new(5, 4)));
    }

    #[test]
    fn test_wrapped_distance_tie_break() {
        let mut fx = Fixture::new(10, 10, true);
        // Across the seam: 1 step wrapped, 9 steps unwrapped
        fx.resource(Good::Sugar, Position::new(9, 0), 3.0);
        fx.resource(Good::Spice, Position::new(9, 0), 3.0);
        fx.resource(Good::Sugar, Position::new(2, 0), 3.0);
        fx.resource(Good::Spice, Position::new(2, 0), 3.0);
        let trader = fx.trader(Position::new(0, 0), 2, NeighborMode::VonNeumann);

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let wrap = fx.grid.wrap_dims();
        let wrapped = choose_destination(&trader, &fx.grid, &fx.scheduler, wrap, &mut rng);
        assert_eq!(wrapped, Some(Position::new(9, 0)));

        let unwrapped = choose_destination(&trader, &fx.grid, &fx.scheduler, None, &mut rng);
        assert_eq!(unwrapped, Some(Position::new(2, 0)));
    }

    #[test]
    fn test_resource_at() {
        let mut fx = Fixture::new(4, 4, false);
        fx.resource(Good::Spice, Position::new(1, 2), 6.0);
        assert_eq!(resource_at(&fx.grid, &fx.scheduler, Good::Spice, Position::new(1, 2)), 6.0);
        assert_eq!(resource_at(&fx.grid, &fx.scheduler, Good::Sugar, Position::new(1, 2)), 0.0);
        assert_eq!(resource_at(&fx.grid, &fx.scheduler, Good::Spice, Position::new(0, 0)), 0.0);
    }
}
