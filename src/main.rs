//! Snowball Stacker entry point
//!
//! Handles platform-specific initialization and runs the game loop. The web
//! build drives the session from `requestAnimationFrame`; the native build
//! runs a headless autopilot session and prints the result.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use web_sys::{
        Document, HtmlCanvasElement, HtmlInputElement, KeyboardEvent, MouseEvent, TouchEvent,
    };

    use snowball_stacker::audio::AudioManager;
    use snowball_stacker::consts::*;
    use snowball_stacker::highscores::format_date;
    use snowball_stacker::sim::{GamePhase, InputController, Session, report_score, tick};
    use snowball_stacker::{GameConfig, HighScores, Settings};

    /// Game instance holding all state
    struct Game {
        session: Session,
        input: InputController,
        /// Demo mode, toggled with `I`
        idle_mode: bool,
        audio: AudioManager,
        settings: Settings,
        highscores: HighScores,
        canvas: HtmlCanvasElement,
        accumulator: f32,
        last_time: f64,
        // FPS tracking
        frame_times: [f64; 60],
        frame_index: usize,
        fps: u32,
        last_phase: GamePhase,
    }

    impl Game {
        fn new(seed: u64, canvas: HtmlCanvasElement) -> Self {
            let settings = Settings::load();
            let mut audio = AudioManager::new();
            audio.apply_settings(&settings);
            let mut highscores = HighScores::load();
            let mut session = Session::new(GameConfig::default(), seed);
            if let Some(player) = highscores.register_player(&settings.player_name) {
                session.set_player_name(&player.name);
            }
            Self {
                session,
                input: InputController::new(),
                idle_mode: false,
                audio,
                settings,
                highscores,
                canvas,
                accumulator: 0.0,
                last_time: 0.0,
                frame_times: [0.0; 60],
                frame_index: 0,
                fps: 0,
                last_phase: GamePhase::Idle,
            }
        }

        /// Convert a CSS pixel x on the canvas to play field x
        fn to_field_x(&self, css_x: f32) -> f32 {
            let client_w = self.canvas.client_width().max(1) as f32;
            css_x * self.session.config.canvas_width / client_w
        }

        /// Run simulation ticks
        fn update(&mut self, dt: f32, time: f64) {
            let dt = dt.min(0.1);
            self.accumulator += dt;

            let mut substeps = 0;
            while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
                let mut input = self.input.take_tick_input();
                input.idle_mode = self.idle_mode;
                tick(&mut self.session, &input, SIM_DT);
                self.accumulator -= SIM_DT;
                substeps += 1;
            }
            // Drop backlog we could not catch up on
            if substeps == MAX_SUBSTEPS {
                self.accumulator = self.accumulator.min(SIM_DT);
            }

            for cue in self.session.drain_cues() {
                self.audio.play(cue);
            }

            if let Some(rank) = report_score(&mut self.session, &mut self.highscores) {
                log::info!("Finished at rank #{}", rank);
            }

            let phase = self.session.phase;
            if phase != self.last_phase {
                log::debug!("Phase {:?} -> {:?}", self.last_phase, phase);
                self.last_phase = phase;
            }

            // Track frame times for FPS
            self.frame_times[self.frame_index] = time;
            self.frame_index = (self.frame_index + 1) % 60;
            let oldest_time = self.frame_times[self.frame_index];
            if oldest_time > 0.0 {
                let elapsed = time - oldest_time;
                if elapsed > 0.0 {
                    self.fps = (60000.0 / elapsed).round() as u32;
                }
            }
        }

        /// Shake the canvas with a CSS transform
        fn apply_shake(&self) {
            let shake = self.session.screen_shake;
            if shake > 0.0 && self.settings.effective_screen_shake() {
                let dx = (js_sys::Math::random() as f32 - 0.5) * 2.0 * shake;
                let dy = (js_sys::Math::random() as f32 - 0.5) * 2.0 * shake;
                let _ = self.canvas.set_attribute(
                    "style",
                    &format!("transform: translate({:.1}px, {:.1}px)", dx, dy),
                );
            } else {
                let _ = self.canvas.remove_attribute("style");
            }
        }

        /// Update HUD elements in DOM
        fn update_hud(&self) {
            let Some(document) = web_sys::window().and_then(|w| w.document()) else {
                return;
            };
            let session = &self.session;

            set_text(&document, "#hud-height .hud-value", &format!("{}px", session.current_height));
            set_text(&document, "#hud-best .hud-value", &format!("{}px", session.max_height));
            set_text(&document, "#hud-blocks .hud-value", &session.blocks_stacked().to_string());
            set_text(&document, "#hud-lives .hud-value", &session.lives.to_string());
            let flashing = session.platform.flash_on && self.settings.effective_hit_flashes();
            if let Some(lives) = document.get_element_by_id("hud-lives") {
                let _ = lives.set_attribute("class", if flashing { "flash" } else { "" });
            }
            let record = self
                .highscores
                .top_height()
                .map(|h| format!("{}px", h))
                .unwrap_or_else(|| "-".to_string());
            set_text(&document, "#hud-record .hud-value", &record);
            set_text(&document, "#hud-player .hud-value", &session.player_name);
            set_text(&document, "#hud-fps .hud-value", &self.fps.to_string());
            set_visible(&document, "hud-fps", self.settings.show_fps);
            set_visible(&document, "idle-badge", self.idle_mode);

            set_visible(&document, "start-prompt", session.phase == GamePhase::Idle);
            set_visible(&document, "wave-warning", session.phase == GamePhase::ProjectileWave);

            let game_over = session.is_game_over();
            set_visible(&document, "game-over", game_over);
            if let Some(stats) = session.final_stats.filter(|_| game_over) {
                set_text(&document, "#final-height", &format!("{}px", stats.max_height));
                set_text(&document, "#final-blocks", &stats.blocks_stacked.to_string());
                let rank = stats
                    .rank
                    .map(|r| format!("#{}", r))
                    .unwrap_or_else(|| "-".to_string());
                set_text(&document, "#final-rank", &rank);
            }
        }

        /// Refresh the leaderboard list
        fn update_leaderboard(&self) {
            let Some(document) = web_sys::window().and_then(|w| w.document()) else {
                return;
            };
            let lines: Vec<String> = self
                .highscores
                .entries
                .iter()
                .enumerate()
                .map(|(i, e)| {
                    format!(
                        "{}. {} {}px ({} blocks) {}",
                        i + 1,
                        e.player_name,
                        e.height,
                        e.blocks_stacked,
                        format_date(e.timestamp)
                    )
                })
                .collect();
            let text = if lines.is_empty() {
                "No scores yet".to_string()
            } else {
                lines.join("\n")
            };
            set_text(&document, "#leaderboard", &text);
        }

        /// Tear down the session and wait for the next press
        fn restart(&mut self) {
            self.session.restart();
            self.input.reset();
            self.accumulator = 0.0;
            for cue in self.session.drain_cues() {
                self.audio.play(cue);
            }
            self.update_leaderboard();
            log::info!("Game restarted");
        }

        /// Switch to a player by name; blank names are ignored
        fn set_player(&mut self, raw_name: &str) {
            let Some(player) = self.highscores.register_player(raw_name) else {
                log::warn!("Ignoring blank player name");
                return;
            };
            if let Err(e) = self.highscores.save() {
                log::warn!("Failed to save players: {}", e);
            }
            self.session.set_player_name(&player.name);
            self.settings.player_name = player.name;
            self.settings.save();
            log::info!("Playing as {}", self.session.player_name);
        }

        /// Wipe every score and player, keeping the current name
        fn clear_scores(&mut self) {
            self.highscores.clear();
            self.highscores.register_player(&self.session.player_name);
            if let Err(e) = self.highscores.save() {
                log::warn!("Failed to save cleared leaderboard: {}", e);
            }
            self.update_leaderboard();
        }

        fn toggle_mute(&mut self) {
            self.settings.muted = !self.settings.muted;
            self.settings.save();
            self.audio.apply_settings(&self.settings);
            log::info!("Muted: {}", self.settings.muted);
        }
    }

    fn set_text(document: &Document, selector: &str, text: &str) {
        if let Some(el) = document.query_selector(selector).ok().flatten() {
            el.set_text_content(Some(text));
        }
    }

    fn set_visible(document: &Document, id: &str, visible: bool) {
        if let Some(el) = document.get_element_by_id(id) {
            let _ = el.set_attribute("class", if visible { "" } else { "hidden" });
        }
    }

    pub fn run() -> Result<(), JsValue> {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        log::info!("Snowball Stacker starting...");

        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;

        // Hide loading indicator
        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        let canvas: HtmlCanvasElement = document
            .get_element_by_id("canvas")
            .ok_or("no canvas")?
            .dyn_into()?;

        let seed = js_sys::Date::now() as u64;
        let game = Rc::new(RefCell::new(Game::new(seed, canvas.clone())));
        {
            let g = game.borrow();
            canvas.set_width(g.session.config.canvas_width as u32);
            canvas.set_height(g.session.config.canvas_height as u32);
            g.update_leaderboard();
        }
        log::info!("Game initialized with seed: {}", seed);

        setup_input_handlers(&canvas, &window, game.clone());
        setup_restart_buttons(&document, game.clone());
        setup_player_controls(&document, game.clone());
        setup_focus_handlers(&window, game.clone());

        if let Some(hud) = document.get_element_by_id("hud") {
            let _ = hud.set_attribute("class", "");
        }

        request_animation_frame(game);
        log::info!("Snowball Stacker running!");
        Ok(())
    }

    fn setup_input_handlers(canvas: &HtmlCanvasElement, window: &web_sys::Window, game: Rc<RefCell<Game>>) {
        // Mouse down - start dragging, first press starts the game
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let mut g = game.borrow_mut();
                g.audio.resume();
                let x = g.to_field_x(event.offset_x() as f32);
                g.input.pointer_down(x);
            });
            let _ = canvas
                .add_event_listener_with_callback("mousedown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Mouse move - steer while held
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let mut g = game.borrow_mut();
                let x = g.to_field_x(event.offset_x() as f32);
                g.input.pointer_move(x);
            });
            let _ = canvas
                .add_event_listener_with_callback("mousemove", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Mouse up / leave - stop dragging, keep the target
        for event_name in ["mouseup", "mouseleave"] {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                let mut g = game.borrow_mut();
                if event_name == "mouseleave" {
                    g.input.pointer_leave();
                } else {
                    g.input.pointer_up();
                }
            });
            let _ = canvas
                .add_event_listener_with_callback(event_name, closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Touch start / move / end - track the first touch only
        for event_name in ["touchstart", "touchmove", "touchend", "touchcancel"] {
            let game = game.clone();
            let canvas_clone = canvas.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: TouchEvent| {
                event.prevent_default();
                let mut g = game.borrow_mut();
                let rect = canvas_clone.get_bounding_client_rect();
                let touches = event.changed_touches();
                for i in 0..touches.length() {
                    let Some(touch) = touches.get(i) else {
                        continue;
                    };
                    let id = touch.identifier();
                    let x = g.to_field_x((touch.client_x() as f64 - rect.left()) as f32);
                    match event_name {
                        "touchstart" => {
                            g.audio.resume();
                            g.input.touch_start(id, x);
                        }
                        "touchmove" => g.input.touch_move(id, x),
                        _ => g.input.touch_end(id),
                    }
                }
            });
            let _ = canvas
                .add_event_listener_with_callback(event_name, closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Keyboard
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                let mut g = game.borrow_mut();
                match event.key().as_str() {
                    "i" | "I" => {
                        g.idle_mode = !g.idle_mode;
                        log::info!("Idle mode: {}", g.idle_mode);
                    }
                    "m" | "M" => g.toggle_mute(),
                    "r" | "R" if g.session.is_game_over() => g.restart(),
                    _ => {}
                }
            });
            let _ = window
                .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_restart_buttons(document: &Document, game: Rc<RefCell<Game>>) {
        for id in ["restart-btn", "play-again-btn"] {
            if let Some(btn) = document.get_element_by_id(id) {
                let game = game.clone();
                let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                    game.borrow_mut().restart();
                });
                let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
                closure.forget();
            }
        }
    }

    fn setup_player_controls(document: &Document, game: Rc<RefCell<Game>>) {
        // Name field - register or reuse the player on change
        if let Some(input) = document
            .get_element_by_id("player-name")
            .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
        {
            input.set_value(&game.borrow().session.player_name);
            let game = game.clone();
            let field = input.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                let mut g = game.borrow_mut();
                g.set_player(&field.value());
                field.set_value(&g.session.player_name);
            });
            let _ = input.add_event_listener_with_callback("change", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        if let Some(btn) = document.get_element_by_id("clear-scores-btn") {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                game.borrow_mut().clear_scores();
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_focus_handlers(window: &web_sys::Window, game: Rc<RefCell<Game>>) {
        // Window blur - silence audio if the player asked for it
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                let mut g = game.borrow_mut();
                if g.settings.mute_on_blur {
                    g.audio.suspend();
                }
            });
            let _ = window.add_event_listener_with_callback("blur", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                game.borrow().audio.resume();
            });
            let _ = window.add_event_listener_with_callback("focus", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn request_animation_frame(game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            game_loop(game, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(game: Rc<RefCell<Game>>, time: f64) {
        {
            let mut g = game.borrow_mut();
            let was_over = g.session.is_game_over();

            // Calculate delta time
            let dt = if g.last_time > 0.0 {
                ((time - g.last_time) / 1000.0) as f32
            } else {
                SIM_DT
            };
            g.last_time = time;

            g.update(dt, time);
            g.apply_shake();
            g.update_hud();

            if !was_over && g.session.is_game_over() {
                g.update_leaderboard();
            }
        }

        request_animation_frame(game);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() -> Result<(), JsValue> {
    wasm_game::run()
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    use std::process::ExitCode;

    use snowball_stacker::consts::SIM_DT;
    use snowball_stacker::sim::{Session, TickInput, end_game, report_score, tick};
    use snowball_stacker::{GameConfig, HighScores};

    /// Ten minutes of game time
    const MAX_TICKS: u64 = 60 * 60 * 10;

    env_logger::init();

    // Usage: snowball-stacker [seed] [config.json] [player]
    let mut args = std::env::args().skip(1);
    let seed = match args.next() {
        Some(arg) => match arg.parse::<u64>() {
            Ok(seed) => seed,
            Err(e) => {
                log::error!("Invalid seed {:?}: {}", arg, e);
                return ExitCode::FAILURE;
            }
        },
        None => 42,
    };
    let config = match args.next() {
        Some(path) => {
            let json = match std::fs::read_to_string(&path) {
                Ok(json) => json,
                Err(e) => {
                    log::error!("Cannot read {}: {}", path, e);
                    return ExitCode::FAILURE;
                }
            };
            match GameConfig::from_json(&json) {
                Ok(config) => config,
                Err(e) => {
                    log::error!("Bad config {}: {}", path, e);
                    return ExitCode::FAILURE;
                }
            }
        }
        None => GameConfig::default(),
    };

    let mut scores = HighScores::load();
    let name = args.next().unwrap_or_else(|| "Autopilot".to_string());
    let Some(player) = scores.register_player(&name) else {
        log::error!("Player name must not be blank");
        return ExitCode::FAILURE;
    };

    log::info!(
        "Snowball Stacker (native) headless autopilot run, seed {}, player {}",
        seed,
        player.name
    );

    let mut session = Session::new(config, seed);
    session.set_player_name(&player.name);
    let input = TickInput {
        idle_mode: true,
        ..Default::default()
    };
    while !session.is_game_over() && session.time_ticks < MAX_TICKS {
        tick(&mut session, &input, SIM_DT);
        for cue in session.drain_cues() {
            log::trace!("cue {:?}", cue);
        }
    }
    if !session.is_game_over() {
        log::info!("Time limit reached");
        end_game(&mut session);
    }

    report_score(&mut session, &mut scores);

    if let Some(stats) = session.final_stats {
        println!("Player:         {}", session.player_name);
        println!("Max height:     {}px", stats.max_height);
        println!("Blocks stacked: {}", stats.blocks_stacked);
        println!("Blocks dropped: {}", stats.blocks_dropped);
        if let Some(rank) = stats.rank {
            println!("Rank:           #{}", rank);
        }
        println!("Ticks:          {}", session.time_ticks);
    }
    ExitCode::SUCCESS
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}
