use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use kinema_anim::loader::DecodeFetcher;
use kinema_anim::prelude::*;
use kinema_engine::logging::{init_logging, LoggingConfig};

const IMAGES: [&str; 3] = ["rabbit-big.png", "rabbit-lose.png", "rabbit-win.png"];

const RIGHT_RUNNING: &[&str] = &["0 -854", "-174 -852", "-349 -852", "-524 -852", "-698 -851", "-873 -848"];
const LEFT_RUNNING: &[&str] = &["0 -373", "-175 -376", "-350 -377", "-524 -377", "-699 -377", "-873 -379"];
const RABBIT_WIN: &[&str] = &[
    "0 0", "-198 0", "-609 0", "-816 0", "0 -96", "-208 -97", "-415 -97", "-623 -97", "-831 -97",
    "0 -203", "-207 -203", "-415 -203", "-623 -203", "-831 -203", "0 -307", "-206 -307", "-414 -307",
    "-623 -307",
];
const RABBIT_LOSE: &[&str] = &[
    "0 0", "-163 0", "-327 0", "-491 0", "-655 0", "-819 0", "0 -135", "-166 -135", "-333 -135",
    "-500 -135", "-668 -135", "-835 -135", "0 -262",
];

/// How long the demo runs before the endless chain is cut off.
const DEMO_DURATION: Duration = Duration::from_secs(12);

// ── terminal sprite ───────────────────────────────────────────────────────

/// Sprite that reports its property writes to the log instead of a screen.
struct TerminalSprite {
    name:     &'static str,
    image:    Option<String>,
    position: Position,
    left:     f32,
    frames:   usize,
}

impl TerminalSprite {
    fn shared(name: &'static str) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self { name, image: None, position: Position::default(), left: 0.0, frames: 0 }))
    }

    fn move_to(&mut self, left: f32) {
        self.left = left;
    }
}

impl SpriteElement for TerminalSprite {
    fn set_background_image(&mut self, url: &str) {
        if self.image.as_deref() != Some(url) {
            log::info!("{}: background {url}", self.name);
            self.image = Some(url.to_string());
        }
    }

    fn set_background_position(&mut self, position: Position) {
        self.position = position;
        self.frames += 1;
        log::debug!("{}: frame at {position} (left {}px)", self.name, self.left);
    }
}

// ── chains ────────────────────────────────────────────────────────────────

/// Runs right forever; stopped by the demo deadline.
fn running_forever(loader: &ImageLoader, sprite: Rc<RefCell<TerminalSprite>>) -> Result<Animation> {
    let frames = parse_positions(RIGHT_RUNNING).context("right-running map")?;
    let anim = Animation::with_loader(loader.clone())
        .preload_images(IMAGES)
        .animate_background_position(sprite, frames, Some(IMAGES[0]))
        .repeat_forever();
    anim.start();
    Ok(anim)
}

/// Runs right then back left twice, waits, then celebrates.
fn running_back_and_forth(loader: &ImageLoader, sprite: Rc<RefCell<TerminalSprite>>) -> Result<Animation> {
    const INTERVAL: Duration = Duration::from_millis(50);
    const SPEED: f32 = 6.0;
    const INIT_LEFT: f32 = 100.0;
    const FINAL_LEFT: f32 = 400.0;

    let right_map = parse_positions(RIGHT_RUNNING).context("right-running map")?;
    let left_map = parse_positions(LEFT_RUNNING).context("left-running map")?;
    let win = parse_positions(RABBIT_WIN).context("win map")?;

    let runner = sprite.clone();
    let mut right = true;
    let mut frame = 4;

    let anim = Animation::with_loader(loader.clone())
        .preload_images(IMAGES)
        .custom_frame_task(move |next, elapsed| {
            let ratio = elapsed.as_secs_f32() / INTERVAL.as_secs_f32();
            let (map, left, at_end) = if right {
                let left = (INIT_LEFT + SPEED * ratio).min(FINAL_LEFT);
                (&right_map, left, left == FINAL_LEFT)
            } else {
                let left = (FINAL_LEFT - SPEED * ratio).max(INIT_LEFT);
                (&left_map, left, left == INIT_LEFT)
            };
            if at_end {
                right = !right;
                frame = 4;
                next.proceed();
                return;
            }

            let mut sprite = runner.borrow_mut();
            sprite.move_to(left);
            sprite.set_background_image(IMAGES[0]);
            sprite.set_background_position(map[frame]);
            frame = (frame + 1) % map.len();
        })
        .repeat(Some(1))
        .wait(Duration::from_secs(1))
        .animate_background_position(sprite, win, Some(IMAGES[2]))
        .then(|| log::info!("rabbit2 finished"));
    anim.start_with_interval(INTERVAL);
    Ok(anim)
}

/// Win sequence, four times in a row.
fn winning(loader: &ImageLoader, sprite: Rc<RefCell<TerminalSprite>>) -> Result<Animation> {
    let frames = parse_positions(RABBIT_WIN).context("win map")?;
    let anim = Animation::with_loader(loader.clone())
        .preload_images(IMAGES)
        .animate_background_position(sprite, frames, Some(IMAGES[2]))
        .repeat(Some(3))
        .then(|| log::info!("win: repeated three times and finished"));
    anim.start_with_interval(Duration::from_millis(150));
    Ok(anim)
}

/// Lose sequence, three times with a pause after each run.
fn losing(loader: &ImageLoader, sprite: Rc<RefCell<TerminalSprite>>) -> Result<Animation> {
    let frames = parse_positions(RABBIT_LOSE).context("lose map")?;
    let anim = Animation::with_loader(loader.clone())
        .preload_images(IMAGES)
        .animate_background_position(sprite, frames, Some(IMAGES[1]))
        .wait(Duration::from_secs(2))
        .repeat(Some(2))
        .then(|| log::info!("lose: repeated twice and finished"));
    anim.start();
    Ok(anim)
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    // Sprite sheets are looked up here; missing files only log a warning.
    let assets = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("assets"));
    log::info!("kinema demo: {} s, sprite sheets from {}", DEMO_DURATION.as_secs(), assets.display());

    let event_loop = EventLoop::realtime(LoopConfig::default());
    let fetcher = DecodeFetcher::new(event_loop.clone()).with_root(assets);
    let loader = ImageLoader::new(event_loop.host(), Rc::new(fetcher));

    let sprites = [
        TerminalSprite::shared("rabbit1"),
        TerminalSprite::shared("rabbit2"),
        TerminalSprite::shared("rabbit3"),
        TerminalSprite::shared("rabbit4"),
    ];
    let chains = [
        running_forever(&loader, sprites[0].clone())?,
        running_back_and_forth(&loader, sprites[1].clone())?,
        winning(&loader, sprites[2].clone())?,
        losing(&loader, sprites[3].clone())?,
    ];

    event_loop.run_for(DEMO_DURATION).context("event loop failed")?;

    for chain in &chains {
        chain.dispose();
    }
    for sprite in &sprites {
        let sprite = sprite.borrow();
        log::info!("{}: {} frame(s), last at {}", sprite.name, sprite.frames, sprite.position);
    }
    Ok(())
}
