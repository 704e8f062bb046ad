//! The shared arena grid.
//!
//! Cells are stored row-major. A positive value is a snake segment whose value
//! counts down once per tick, so the trailing body shrinks away on its own and
//! a snake's visible length equals the age written at its head.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::{CELL_APPLE, CELL_EMPTY};

/// Random probes before `generate_apple` falls back to scanning free cells.
const APPLE_PROBES: usize = 64;

#[derive(Debug, Clone)]
pub struct Board {
    width: usize,
    height: usize,
    cells: Vec<i32>,
    rng: StdRng,
}

impl Board {
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_rng(width, height, StdRng::from_entropy())
    }

    /// Board whose apple placement is reproducible.
    pub fn with_seed(width: usize, height: usize, seed: u64) -> Self {
        Self::with_rng(width, height, StdRng::seed_from_u64(seed))
    }

    fn with_rng(width: usize, height: usize, rng: StdRng) -> Self {
        assert!(width > 0 && height > 0, "board dimensions must be positive");
        Self {
            width,
            height,
            cells: vec![CELL_EMPTY; width * height],
            rng,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    fn index(&self, x: i32, y: i32) -> usize {
        assert!(
            self.contains(x, y),
            "cell ({x}, {y}) outside {}x{} board",
            self.width,
            self.height
        );
        y as usize * self.width + x as usize
    }

    pub fn get_cell(&self, x: i32, y: i32) -> i32 {
        self.cells[self.index(x, y)]
    }

    pub fn set_cell(&mut self, x: i32, y: i32, value: i32) {
        let index = self.index(x, y);
        self.cells[index] = value;
    }

    pub fn hit_apple(&self, x: i32, y: i32) -> bool {
        self.get_cell(x, y) == CELL_APPLE
    }

    /// Clears every snake segment. Apples stay where they are.
    pub fn reset(&mut self) {
        for cell in self.cells.iter_mut().filter(|cell| **cell > 0) {
            *cell = CELL_EMPTY;
        }
    }

    /// Ages every segment by one tick.
    pub fn tick_decay(&mut self) {
        for cell in self.cells.iter_mut().filter(|cell| **cell > 0) {
            *cell -= 1;
        }
    }

    /// Places an apple on a uniformly random empty cell and returns it.
    ///
    /// Returns `None` when the board has no empty cell left.
    pub fn generate_apple(&mut self) -> Option<(i32, i32)> {
        for _ in 0..APPLE_PROBES {
            let x = self.rng.gen_range(0..self.width) as i32;
            let y = self.rng.gen_range(0..self.height) as i32;
            if self.get_cell(x, y) == CELL_EMPTY {
                self.set_cell(x, y, CELL_APPLE);
                return Some((x, y));
            }
        }

        let free = self.free_cells();
        let &(x, y) = free.choose(&mut self.rng)?;
        self.set_cell(x, y, CELL_APPLE);
        Some((x, y))
    }

    pub fn free_cells(&self) -> Vec<(i32, i32)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell == CELL_EMPTY)
            .map(|(index, _)| ((index % self.width) as i32, (index / self.width) as i32))
            .collect()
    }

    pub fn apple_count(&self) -> usize {
        self.cells.iter().filter(|cell| **cell == CELL_APPLE).count()
    }

    /// Row-major copy of the grid for the wire.
    pub fn serialize(&self) -> Vec<i32> {
        self.cells.clone()
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_creation() {
        let board = Board::with_seed(4, 3, 1);
        assert_eq!(board.width(), 4);
        assert_eq!(board.height(), 3);
        assert_eq!(board.serialize(), vec![0; 12]);
        assert_eq!(board.apple_count(), 0);
    }

    #[test]
    fn test_set_and_get_cell() {
        let mut board = Board::with_seed(4, 3, 1);
        board.set_cell(3, 2, 7);
        assert_eq!(board.get_cell(3, 2), 7);
        assert_eq!(board.serialize()[2 * 4 + 3], 7);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_access_panics() {
        let board = Board::with_seed(4, 3, 1);
        board.get_cell(4, 0);
    }

    #[test]
    fn test_contains() {
        let board = Board::with_seed(4, 3, 1);
        assert!(board.contains(0, 0));
        assert!(board.contains(3, 2));
        assert!(!board.contains(-1, 0));
        assert!(!board.contains(4, 0));
        assert!(!board.contains(0, 3));
    }

    #[test]
    fn test_tick_decay() {
        let mut board = Board::with_seed(3, 2, 1);
        board.set_cell(0, 0, 3);
        board.set_cell(1, 0, 1);
        board.set_cell(2, 0, CELL_APPLE);
        let before = board.serialize();

        board.tick_decay();
        let after = board.serialize();

        for (old, new) in before.iter().zip(after.iter()) {
            if *old > 0 {
                assert_eq!(*new, old - 1);
            } else {
                assert_eq!(new, old);
            }
            assert!(*new >= CELL_APPLE);
        }
        assert_eq!(board.get_cell(1, 0), CELL_EMPTY);
        assert!(board.hit_apple(2, 0));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut board = Board::with_seed(3, 3, 1);
        board.set_cell(0, 0, 4);
        board.set_cell(1, 1, 2);
        board.set_cell(2, 2, CELL_APPLE);

        board.reset();
        let once = board.serialize();
        board.reset();

        assert_eq!(board.serialize(), once);
        assert_eq!(board.apple_count(), 1);
        assert_eq!(once.iter().filter(|cell| **cell > 0).count(), 0);
    }

    #[test]
    fn test_generate_apple_on_empty_cell() {
        let mut board = Board::with_seed(5, 5, 42);
        let (x, y) = board.generate_apple().unwrap();
        assert!(board.hit_apple(x, y));
        assert_eq!(board.apple_count(), 1);
    }

    #[test]
    fn test_generate_apple_uses_last_free_cell() {
        let mut board = Board::with_seed(3, 3, 7);
        for y in 0..3 {
            for x in 0..3 {
                board.set_cell(x, y, 5);
            }
        }
        board.set_cell(2, 1, CELL_EMPTY);

        assert_eq!(board.generate_apple(), Some((2, 1)));
        assert_eq!(board.apple_count(), 1);
    }

    #[test]
    fn test_generate_apple_on_full_board() {
        let mut board = Board::with_seed(2, 2, 7);
        for y in 0..2 {
            for x in 0..2 {
                board.set_cell(x, y, 1);
            }
        }

        assert_eq!(board.generate_apple(), None);
        assert_eq!(board.apple_count(), 0);
    }

    #[test]
    fn test_free_cells() {
        let mut board = Board::with_seed(2, 2, 7);
        board.set_cell(0, 0, 1);
        board.set_cell(1, 1, CELL_APPLE);
        assert_eq!(board.free_cells(), vec![(1, 0), (0, 1)]);
    }

    #[test]
    fn test_seeded_boards_place_same_apple() {
        let mut first = Board::with_seed(20, 20, 99);
        let mut second = Board::with_seed(20, 20, 99);
        assert_eq!(first.generate_apple(), second.generate_apple());
    }
}
