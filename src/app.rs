use crate::audio::{MediaHandle, NullMediaHandle, RodioMediaHandle};
use crate::config;
use crate::core::{PlayerCore, SEEK_STEP_SECONDS, VOLUME_STEP};
use crate::model::Playlist;
use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::stdout;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct AppStartupOptions {
    pub config_path: Option<PathBuf>,
    pub no_audio: bool,
}

pub fn run(options: AppStartupOptions) -> Result<()> {
    let config = config::load_config(options.config_path.as_deref())?;
    let playlist = Playlist::new(config.tracks)?;

    let handle: Box<dyn MediaHandle> = if options.no_audio {
        Box::new(NullMediaHandle::new())
    } else {
        match RodioMediaHandle::new() {
            Ok(handle) => Box::new(handle),
            Err(_) => Box::new(NullMediaHandle::new()),
        }
    };

    let mut core = PlayerCore::new(playlist, config.links, handle);
    core.bind_current();

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut last_tick = Instant::now();
    let mut playlist_rect = ratatui::prelude::Rect::default();

    let result: Result<()> = loop {
        core.pump();

        if core.dirty || last_tick.elapsed() > Duration::from_millis(250) {
            terminal.draw(|frame| {
                playlist_rect = crate::ui::playlist_rect(frame.area());
                crate::ui::draw(frame, &core)
            })?;
            core.dirty = false;
            last_tick = Instant::now();
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }

        match event::read()? {
            Event::Mouse(mouse) => handle_mouse(&mut core, mouse, playlist_rect),
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if apply_key(&mut core, key) == KeyOutcome::Quit {
                    break Ok(());
                }
            }
            _ => {}
        }
    };

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Quit,
}

fn apply_key(core: &mut PlayerCore, key: KeyEvent) -> KeyOutcome {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return KeyOutcome::Quit;
        }
        KeyCode::Char('q') | KeyCode::Esc => return KeyOutcome::Quit,
        KeyCode::Char(' ') => core.toggle_play(),
        KeyCode::Char('n') => core.next(),
        KeyCode::Char('b') => core.previous(),
        KeyCode::Down => core.select_next(),
        KeyCode::Up => core.select_prev(),
        KeyCode::Enter => core.activate_selected(),
        KeyCode::Left => core.seek_by(-SEEK_STEP_SECONDS),
        KeyCode::Right => core.seek_by(SEEK_STEP_SECONDS),
        KeyCode::Char('+') | KeyCode::Char('=') => core.adjust_volume(VOLUME_STEP),
        KeyCode::Char('-') => core.adjust_volume(-VOLUME_STEP),
        KeyCode::Char('r') => core.toggle_repeat(),
        KeyCode::Char('t') => core.cycle_theme(),
        _ => {}
    }
    KeyOutcome::Continue
}

fn handle_mouse(core: &mut PlayerCore, mouse: MouseEvent, playlist_rect: ratatui::prelude::Rect) {
    let inside = point_in_rect(mouse.column, mouse.row, playlist_rect);
    match mouse.kind {
        MouseEventKind::ScrollDown if inside => core.select_next(),
        MouseEventKind::ScrollUp if inside => core.select_prev(),
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: ratatui::prelude::Rect) -> bool {
    if rect.width == 0 || rect.height == 0 {
        return false;
    }
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}
