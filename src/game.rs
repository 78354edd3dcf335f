use rand::{rngs::SmallRng, Rng, SeedableRng};

pub const BOARD_WIDTH: i32 = 360;
pub const BOARD_HEIGHT: i32 = 640;

const BIRD_WIDTH: i32 = 34;
const BIRD_HEIGHT: i32 = 24;
const PIPE_WIDTH: i32 = 64;
const PIPE_HEIGHT: i32 = 512;
const OPENING_SPACE: i32 = BOARD_HEIGHT / 4;

const GRAVITY: i32 = 1;
const LIFT: i32 = 10;
const SCROLL_VELOCITY: i32 = -4;

/// Physics runs at a fixed 60 Hz regardless of display refresh rate.
pub const TICK_STEP: f32 = 1.0 / 60.0;
/// A new pipe gap enters from the right every 1.5 seconds of running time.
pub const SPAWN_INTERVAL: f32 = 1.5;
/// At most 40 ms of a stalled frame is banked, so the game skips time
/// instead of fast-forwarding through the stall.
const MAX_FRAME_DT: f32 = 0.04;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GameState {
    NotStarted,
    Running,
    Paused,
    GameOver,
}

/// Discrete inputs delivered by the platform layer. Anything the browser
/// reports that does not map to one of these never reaches the game.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    LiftPressed,
    DropPressed,
    LiftReleased,
    DropReleased,
    ConfirmPressed,
    PausePressed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Bird {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bird {
    fn new() -> Self {
        Self {
            x: BOARD_WIDTH / 8,
            y: BOARD_HEIGHT / 2,
            width: BIRD_WIDTH,
            height: BIRD_HEIGHT,
        }
    }

    fn rect(&self) -> Rect {
        Rect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// One top/bottom pipe pair sharing a randomized vertical opening.
/// `top_y` is negative: the top pipe hangs down from off-screen, and the
/// bottom pipe starts one pipe height plus the opening below it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PipeGap {
    pub x: i32,
    pub top_y: i32,
    pub passed: bool,
}

impl PipeGap {
    pub fn bottom_y(&self) -> i32 {
        self.top_y + PIPE_HEIGHT + OPENING_SPACE
    }

    fn top_rect(&self) -> Rect {
        Rect {
            x: self.x,
            y: self.top_y,
            width: PIPE_WIDTH,
            height: PIPE_HEIGHT,
        }
    }

    fn bottom_rect(&self) -> Rect {
        Rect {
            x: self.x,
            y: self.bottom_y(),
            width: PIPE_WIDTH,
            height: PIPE_HEIGHT,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct Rect {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl Rect {
    fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }
}

/// A rectangle in board coordinates plus fill color, handed to the
/// rendering layer each frame.
#[derive(Copy, Clone, Debug)]
pub struct DrawRect {
    pub pos: [f32; 2],
    pub size: [f32; 2],
    pub color: [f32; 4],
}

#[derive(Clone, Debug)]
pub struct Palette {
    pub background: [f32; 4],
    pub pipe: [f32; 4],
    pub bird: [f32; 4],
    pub bird_downed: [f32; 4],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: srgb(0x87, 0xce, 0xeb),
            pipe: srgb(0x2e, 0xc4, 0x41),
            bird: srgb(0xff, 0xd0, 0x2a),
            bird_downed: srgb(0xb3, 0x4a, 0x4a),
        }
    }
}

fn srgb(r: u8, g: u8, b: u8) -> [f32; 4] {
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0]
}

#[derive(Debug)]
pub struct Game {
    palette: Palette,
    state: GameState,
    rng: SmallRng,
    bird: Bird,
    velocity: i32,
    gaps: Vec<PipeGap>,
    score: u32,
    high_score: u32,
}

impl Game {
    pub fn new(palette: Palette) -> Self {
        Self::with_rng(palette, SmallRng::from_entropy())
    }

    /// Deterministic spawn sequence for tests.
    pub fn seeded(palette: Palette, seed: u64) -> Self {
        Self::with_rng(palette, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(palette: Palette, rng: SmallRng) -> Self {
        Self {
            palette,
            state: GameState::NotStarted,
            rng,
            bird: Bird::new(),
            velocity: 0,
            gaps: Vec::new(),
            score: 0,
            high_score: 0,
        }
    }

    /// State transition function. Events that make no sense in the current
    /// state are ignored.
    pub fn handle_event(&mut self, event: InputEvent) {
        use InputEvent::*;
        match (self.state, event) {
            (GameState::NotStarted, ConfirmPressed) => self.state = GameState::Running,
            (GameState::GameOver, ConfirmPressed) => {
                self.reset();
                self.state = GameState::Running;
            }
            (GameState::Running, PausePressed) => self.state = GameState::Paused,
            (GameState::Paused, PausePressed) => self.state = GameState::Running,
            (GameState::Running, LiftPressed) => self.velocity = -LIFT,
            (GameState::Running, DropPressed) => self.velocity = LIFT,
            // Releasing a held key drops straight to the base fall rate,
            // not zero, so the bird starts sinking the tick after a tap.
            (GameState::Running, LiftReleased | DropReleased) => self.velocity = GRAVITY,
            _ => {}
        }
    }

    /// One 60 Hz physics step: integrate the bird, scroll and score pipes,
    /// then test for collisions and boundary hits. Does nothing unless the
    /// game is running, so a paused frame leaks no elapsed time.
    pub fn tick(&mut self) {
        if self.state != GameState::Running {
            return;
        }

        self.velocity += GRAVITY;
        self.bird.y = (self.bird.y + self.velocity).clamp(0, BOARD_HEIGHT - BIRD_HEIGHT);

        for gap in &mut self.gaps {
            gap.x += SCROLL_VELOCITY;
            if !gap.passed && gap.x + PIPE_WIDTH < self.bird.x {
                gap.passed = true;
                self.score += 1;
            }
        }

        let bird_rect = self.bird.rect();
        let hit = self.gaps.iter().any(|gap| {
            bird_rect.intersects(&gap.top_rect()) || bird_rect.intersects(&gap.bottom_rect())
        });
        let out_of_bounds = self.bird.y <= 0 || self.bird.y >= BOARD_HEIGHT - BIRD_HEIGHT;
        if hit || out_of_bounds {
            self.enter_game_over();
            return;
        }

        // Fully off-screen gaps can never score or collide again.
        self.gaps.retain(|gap| gap.x + PIPE_WIDTH > 0);
    }

    /// Spawner callback, driven on a 1.5 s cadence while running. The top
    /// pipe's y lands between one quarter and three quarters of a pipe
    /// height above the board, keeping the opening on screen.
    pub fn spawn_gap(&mut self) {
        if self.state != GameState::Running {
            return;
        }
        let top_y = -(PIPE_HEIGHT / 4) - self.rng.gen_range(0..PIPE_HEIGHT / 2);
        self.gaps.push(PipeGap {
            x: BOARD_WIDTH,
            top_y,
            passed: false,
        });
    }

    fn enter_game_over(&mut self) {
        if self.state == GameState::GameOver {
            return;
        }
        self.state = GameState::GameOver;
        self.high_score = self.high_score.max(self.score);
    }

    fn reset(&mut self) {
        self.bird = Bird::new();
        self.velocity = 0;
        self.gaps.clear();
        self.score = 0;
        self.state = GameState::NotStarted;
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    pub fn bird(&self) -> Bird {
        self.bird
    }

    pub fn gaps(&self) -> &[PipeGap] {
        &self.gaps
    }

    pub fn status_text(&self) -> String {
        match self.state {
            GameState::NotStarted => {
                "Press Enter to Start\nUp lifts, Down dives, Space pauses".to_owned()
            }
            GameState::Running => String::new(),
            GameState::Paused => "Game Paused".to_owned(),
            GameState::GameOver => format!(
                "Game Over\nScore: {}  Best: {}\nPress Enter to Restart",
                self.score, self.high_score
            ),
        }
    }

    /// Board-space rectangles for the frame: background, then each gap's
    /// top and bottom pipe in spawn order, then the bird on top.
    pub fn draw_rects(&self) -> Vec<DrawRect> {
        let mut rects = Vec::with_capacity(2 + self.gaps.len() * 2);
        rects.push(DrawRect {
            pos: [0.0, 0.0],
            size: [BOARD_WIDTH as f32, BOARD_HEIGHT as f32],
            color: self.palette.background,
        });

        for gap in &self.gaps {
            for rect in [gap.top_rect(), gap.bottom_rect()] {
                // Pipes overhang the board on three sides; emit only the
                // visible part.
                let x0 = rect.x.max(0);
                let x1 = (rect.x + rect.width).min(BOARD_WIDTH);
                let y0 = rect.y.max(0);
                let y1 = (rect.y + rect.height).min(BOARD_HEIGHT);
                if x1 <= x0 || y1 <= y0 {
                    continue;
                }
                rects.push(DrawRect {
                    pos: [x0 as f32, y0 as f32],
                    size: [(x1 - x0) as f32, (y1 - y0) as f32],
                    color: self.palette.pipe,
                });
            }
        }

        let bird_color = if self.state == GameState::GameOver {
            self.palette.bird_downed
        } else {
            self.palette.bird
        };
        rects.push(DrawRect {
            pos: [self.bird.x as f32, self.bird.y as f32],
            size: [self.bird.width as f32, self.bird.height as f32],
            color: bird_color,
        });

        rects
    }
}

/// Converts wall-clock frame callbacks into due counts for the two fixed
/// schedules the game runs on: 60 Hz ticks and 1.5 s spawns. Time is
/// banked only while the game is running, so both schedules freeze and
/// resume together across a pause and nothing leaks in while frozen.
#[derive(Debug)]
pub struct FrameClock {
    last_time_ms: f64,
    tick_accum: f32,
    spawn_accum: f32,
}

/// Work owed for one frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Schedule {
    pub ticks: u32,
    pub spawns: u32,
}

impl FrameClock {
    pub fn new(now_ms: f64) -> Self {
        Self {
            last_time_ms: now_ms,
            tick_accum: 0.0,
            spawn_accum: 0.0,
        }
    }

    /// Banks the time since the previous frame and drains whole tick and
    /// spawn periods from it.
    pub fn advance(&mut self, now_ms: f64, running: bool) -> Schedule {
        let dt = ((now_ms - self.last_time_ms) / 1000.0) as f32;
        self.last_time_ms = now_ms;
        if !running || !dt.is_finite() || dt <= 0.0 {
            return Schedule::default();
        }
        self.tick_accum += dt.min(MAX_FRAME_DT);
        self.spawn_accum += dt.min(MAX_FRAME_DT);

        let mut due = Schedule::default();
        while self.tick_accum >= TICK_STEP {
            self.tick_accum -= TICK_STEP;
            due.ticks += 1;
        }
        while self.spawn_accum >= SPAWN_INTERVAL {
            self.spawn_accum -= SPAWN_INTERVAL;
            due.spawns += 1;
        }
        due
    }

    /// Starts both schedules from zero, for a fresh start or a restart.
    /// A resume from pause deliberately does not rearm; the banked
    /// remainders pick up where they stopped.
    pub fn rearm(&mut self) {
        self.tick_accum = 0.0;
        self.spawn_accum = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use InputEvent::*;

    fn running_game() -> Game {
        let mut game = Game::seeded(Palette::default(), 7);
        game.handle_event(ConfirmPressed);
        game
    }

    #[test]
    fn gravity_integration_matches_closed_form() {
        let mut game = running_game();
        game.bird.y = 308;

        game.tick();
        assert_eq!(game.velocity, 1);
        assert_eq!(game.bird.y, 309);

        for _ in 0..9 {
            game.tick();
        }
        // y_n = y_0 + n(n+1)/2 under constant unit gravity.
        assert_eq!(game.velocity, 10);
        assert_eq!(game.bird.y, 308 + 55);
    }

    #[test]
    fn falling_to_the_floor_clamps_and_ends_the_game() {
        let mut game = running_game();
        for _ in 0..100 {
            game.tick();
        }
        assert_eq!(game.state(), GameState::GameOver);
        assert_eq!(game.bird.y, BOARD_HEIGHT - BIRD_HEIGHT);
    }

    #[test]
    fn hitting_the_ceiling_clamps_and_ends_the_game() {
        let mut game = running_game();
        game.velocity = -1000;
        game.tick();
        assert_eq!(game.bird.y, 0);
        assert_eq!(game.state(), GameState::GameOver);
    }

    #[test]
    fn tick_is_inert_unless_running() {
        let mut game = Game::seeded(Palette::default(), 7);
        game.tick();
        assert_eq!(game.bird.y, BOARD_HEIGHT / 2);
        assert_eq!(game.score(), 0);

        game.handle_event(ConfirmPressed);
        game.spawn_gap();
        game.tick();
        game.handle_event(PausePressed);
        let frozen_bird = game.bird;
        let frozen_gaps = game.gaps.clone();
        for _ in 0..50 {
            game.tick();
        }
        assert_eq!(game.bird, frozen_bird);
        assert_eq!(game.gaps, frozen_gaps);
    }

    #[test]
    fn pausing_leaks_no_time_into_physics() {
        let mut straight = running_game();
        for _ in 0..30 {
            straight.tick();
        }

        let mut interrupted = running_game();
        for _ in 0..10 {
            interrupted.tick();
        }
        interrupted.handle_event(PausePressed);
        for _ in 0..50 {
            interrupted.tick();
        }
        interrupted.handle_event(PausePressed);
        for _ in 0..20 {
            interrupted.tick();
        }

        assert_eq!(straight.bird, interrupted.bird);
        assert_eq!(straight.velocity, interrupted.velocity);
    }

    #[test]
    fn spawned_gap_geometry() {
        let mut game = running_game();
        game.spawn_gap();
        let gap = game.gaps()[0];
        assert_eq!(gap.x, BOARD_WIDTH);
        assert!(gap.top_y <= -PIPE_HEIGHT / 4);
        assert!(gap.top_y > -PIPE_HEIGHT / 4 - PIPE_HEIGHT / 2);
        assert_eq!(gap.bottom_y(), gap.top_y + 512 + 160);
        assert!(!gap.passed);
    }

    #[test]
    fn spawn_is_ignored_unless_running() {
        let mut game = Game::seeded(Palette::default(), 7);
        game.spawn_gap();
        assert!(game.gaps().is_empty());

        game.handle_event(ConfirmPressed);
        game.handle_event(PausePressed);
        game.spawn_gap();
        assert!(game.gaps().is_empty());
    }

    #[test]
    fn gap_scores_exactly_once_at_the_trailing_edge() {
        let mut game = running_game();
        // One tick from now the trailing edge (x + 64) falls behind the
        // bird's x of 45. Opening placed around the falling bird.
        game.gaps.push(PipeGap {
            x: -16,
            top_y: -200,
            passed: false,
        });

        game.tick();
        assert_eq!(game.score(), 1);
        assert!(game.gaps()[0].passed);

        game.tick();
        assert_eq!(game.score(), 1);
    }

    #[test]
    fn off_screen_gap_is_evicted_after_scoring() {
        let mut game = running_game();
        game.gaps.push(PipeGap {
            x: -62,
            top_y: -200,
            passed: false,
        });
        game.tick();
        assert_eq!(game.score(), 1);
        assert!(game.gaps().is_empty());
    }

    #[test]
    fn lift_and_drop_set_velocity_and_release_restores_fall_rate() {
        let mut game = running_game();
        game.handle_event(LiftPressed);
        assert_eq!(game.velocity, -10);
        game.handle_event(LiftReleased);
        assert_eq!(game.velocity, 1);
        game.handle_event(DropPressed);
        assert_eq!(game.velocity, 10);
        game.handle_event(DropReleased);
        assert_eq!(game.velocity, 1);
    }

    #[test]
    fn movement_inputs_are_ignored_outside_running() {
        let mut game = Game::seeded(Palette::default(), 7);
        game.handle_event(LiftPressed);
        assert_eq!(game.velocity, 0);

        game.handle_event(ConfirmPressed);
        game.handle_event(PausePressed);
        game.handle_event(LiftPressed);
        game.handle_event(DropPressed);
        assert_eq!(game.velocity, 0);
    }

    #[test]
    fn overlapping_pipe_ends_the_game() {
        let mut game = running_game();
        // After integration the bird sits at (45, 300) and the gap's top
        // pipe at (40, 290), the canonical overlapping AABB pair.
        game.bird.y = 300;
        game.velocity = -1;
        game.gaps.push(PipeGap {
            x: 44,
            top_y: 290,
            passed: false,
        });

        game.tick();
        assert_eq!(game.state(), GameState::GameOver);
    }

    #[test]
    fn game_over_captures_the_high_score_once() {
        let mut game = running_game();
        game.score = 5;
        game.velocity = 1000;
        game.tick();
        assert_eq!(game.state(), GameState::GameOver);
        assert_eq!(game.high_score(), 5);

        // A worse follow-up game never lowers it.
        game.handle_event(ConfirmPressed);
        game.score = 2;
        game.velocity = 1000;
        game.tick();
        assert_eq!(game.high_score(), 5);

        // A better one raises it.
        game.handle_event(ConfirmPressed);
        game.score = 9;
        game.velocity = 1000;
        game.tick();
        assert_eq!(game.high_score(), 9);
    }

    #[test]
    fn restart_resets_everything_but_the_high_score() {
        let mut game = running_game();
        game.spawn_gap();
        game.score = 4;
        game.velocity = 1000;
        game.tick();
        assert_eq!(game.state(), GameState::GameOver);

        game.handle_event(ConfirmPressed);
        assert_eq!(game.state(), GameState::Running);
        assert_eq!(game.score(), 0);
        assert_eq!(game.high_score(), 4);
        assert!(game.gaps().is_empty());
        assert_eq!(game.bird.y, BOARD_HEIGHT / 2);
        assert_eq!(game.velocity, 0);
    }

    #[test]
    fn confirm_does_nothing_while_running_or_paused() {
        let mut game = running_game();
        game.score = 3;
        game.handle_event(ConfirmPressed);
        assert_eq!(game.state(), GameState::Running);
        assert_eq!(game.score(), 3);

        game.handle_event(PausePressed);
        game.handle_event(ConfirmPressed);
        assert_eq!(game.state(), GameState::Paused);
    }

    #[test]
    fn status_banner_tracks_the_state() {
        let mut game = Game::seeded(Palette::default(), 7);
        assert!(game.status_text().starts_with("Press Enter to Start"));
        game.handle_event(ConfirmPressed);
        assert!(game.status_text().is_empty());
        game.handle_event(PausePressed);
        assert_eq!(game.status_text(), "Game Paused");
        game.handle_event(PausePressed);
        game.score = 2;
        game.velocity = 1000;
        game.tick();
        let banner = game.status_text();
        assert!(banner.contains("Game Over"));
        assert!(banner.contains("Score: 2"));
        assert!(banner.contains("Press Enter to Restart"));
    }

    #[test]
    fn draw_rects_order_background_pipes_bird() {
        let mut game = running_game();
        game.spawn_gap();
        // At spawn the gap sits flush with the right edge, so nothing of
        // it is visible yet.
        assert_eq!(game.draw_rects().len(), 2);

        game.tick();
        let rects = game.draw_rects();
        assert_eq!(rects.len(), 4);
        assert_eq!(rects[0].size, [360.0, 640.0]);
        // Top pipe precedes the bottom pipe of the same gap and is clipped
        // to the board.
        assert_eq!(rects[1].pos[1], 0.0);
        assert!(rects[1].pos[1] < rects[2].pos[1]);
        assert_eq!(rects[3].size, [34.0, 24.0]);
    }

    #[test]
    fn frame_clock_converts_wall_time_into_due_ticks() {
        let mut clock = FrameClock::new(0.0);
        let mut ticks = 0;
        for frame in 1..=6 {
            ticks += clock.advance(frame as f64 * 17.0, true).ticks;
        }
        // 102 ms of 17 ms frames is six 60 Hz ticks.
        assert_eq!(ticks, 6);
    }

    #[test]
    fn frame_clock_spawns_on_the_longer_cadence() {
        let mut clock = FrameClock::new(0.0);
        let mut now = 0.0;
        let mut spawns = 0;
        for _ in 0..100 {
            now += 16.0;
            spawns += clock.advance(now, true).spawns;
        }
        // 1.6 s of running time covers one 1.5 s spawn period.
        assert_eq!(spawns, 1);
    }

    #[test]
    fn frame_clock_banks_nothing_while_not_running() {
        let mut clock = FrameClock::new(0.0);
        clock.advance(10.0, true);
        let due = clock.advance(5_000.0, false);
        assert_eq!(due, Schedule::default());
        // On resume only the 10 ms remainder plus new running time count.
        let due = clock.advance(5_010.0, true);
        assert_eq!(due.ticks, 1);
        assert_eq!(due.spawns, 0);
    }

    #[test]
    fn frame_clock_caps_what_a_stalled_frame_banks() {
        let mut clock = FrameClock::new(0.0);
        let due = clock.advance(10_000.0, true);
        // 40 ms cap: two whole ticks, nowhere near a spawn.
        assert_eq!(due.ticks, 2);
        assert_eq!(due.spawns, 0);
    }

    #[test]
    fn rearm_clears_banked_time() {
        let mut clock = FrameClock::new(0.0);
        clock.advance(15.0, true);
        clock.rearm();
        // Only the 15 ms since the previous frame, not 30 ms total.
        let due = clock.advance(30.0, true);
        assert_eq!(due.ticks, 0);
    }
}
