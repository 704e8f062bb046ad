//! A simple steering policy for headless play and load testing.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use shared::{Direction, PlayerResponse, ResponseBody};

pub struct Bot {
    rng: StdRng,
}

impl Bot {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Picks the next heading: a safe move that closes in on the apple if
    /// there is one, any safe move otherwise, straight ahead as a last resort.
    pub fn choose(&mut self, body: &ResponseBody, me: &PlayerResponse) -> Direction {
        let mut safe: Vec<Direction> = Direction::ALL
            .iter()
            .copied()
            .filter(|&direction| direction != me.direction.opposite())
            .filter(|&direction| is_safe(body, me, direction))
            .collect();

        if safe.is_empty() {
            return me.direction;
        }
        safe.shuffle(&mut self.rng);

        match body.apple() {
            Some(apple) => safe
                .into_iter()
                .min_by_key(|&direction| distance(step(me, direction), apple))
                .unwrap_or(me.direction),
            None => safe[0],
        }
    }
}

fn step(me: &PlayerResponse, direction: Direction) -> (i32, i32) {
    let (dx, dy) = direction.delta();
    (me.x + dx, me.y + dy)
}

fn distance(from: (i32, i32), to: (i32, i32)) -> i32 {
    (from.0 - to.0).abs() + (from.1 - to.1).abs()
}

fn is_safe(body: &ResponseBody, me: &PlayerResponse, direction: Direction) -> bool {
    let (x, y) = step(me, direction);
    // Snapshots are taken before segments age, so a 1 is empty by our move.
    matches!(body.cell(x, y), Some(cell) if cell <= 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::CELL_APPLE;

    fn me(x: i32, y: i32, direction: Direction) -> PlayerResponse {
        PlayerResponse {
            id: "me".to_string(),
            x,
            y,
            size: 3,
            direction,
        }
    }

    fn empty_body(width: usize, height: usize) -> ResponseBody {
        ResponseBody {
            board: vec![0; width * height],
            width,
            height,
            players: Vec::new(),
        }
    }

    fn set(body: &mut ResponseBody, x: usize, y: usize, value: i32) {
        let width = body.width;
        body.board[y * width + x] = value;
    }

    #[test]
    fn test_heads_for_apple() {
        let mut body = empty_body(10, 10);
        set(&mut body, 8, 5, CELL_APPLE);
        let mut bot = Bot::new(Some(1));

        assert_eq!(bot.choose(&body, &me(5, 5, Direction::Up)), Direction::Right);
    }

    #[test]
    fn test_never_reverses() {
        let mut body = empty_body(10, 10);
        set(&mut body, 0, 5, CELL_APPLE);
        let mut bot = Bot::new(Some(1));

        let choice = bot.choose(&body, &me(5, 5, Direction::Right));
        assert_ne!(choice, Direction::Left);
    }

    #[test]
    fn test_avoids_wall() {
        let body = empty_body(5, 5);
        let mut bot = Bot::new(Some(3));

        for _ in 0..20 {
            let choice = bot.choose(&body, &me(4, 2, Direction::Right));
            assert_ne!(choice, Direction::Right);
            assert_ne!(choice, Direction::Left);
        }
    }

    #[test]
    fn test_avoids_segments() {
        let mut body = empty_body(5, 5);
        set(&mut body, 2, 1, 4);
        set(&mut body, 3, 2, 3);
        let mut bot = Bot::new(Some(5));

        let choice = bot.choose(&body, &me(2, 2, Direction::Right));
        assert_eq!(choice, Direction::Down);
    }

    #[test]
    fn test_boxed_in_keeps_heading() {
        let mut body = empty_body(3, 3);
        set(&mut body, 1, 0, 5);
        set(&mut body, 2, 1, 5);
        set(&mut body, 1, 2, 5);
        let mut bot = Bot::new(Some(5));

        assert_eq!(bot.choose(&body, &me(1, 1, Direction::Right)), Direction::Right);
    }
}
