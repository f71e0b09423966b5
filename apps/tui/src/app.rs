//! Core TUI application state and event loop.

use std::io;
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};
use servicefunnel_core::Backend;
use tokio::runtime::Runtime;

use crate::screens::{ChatScreen, Session};
use crate::widgets::{centered_rect, status_bar};

/// Application state.
pub(crate) struct App {
    /// Runs backend requests; the UI thread blocks on each one.
    runtime: Runtime,
    backend: Backend,
    chat: ChatScreen,
    /// Whether the app should quit.
    should_quit: bool,
    /// Status message shown in bottom bar.
    status: String,
    /// Whether help overlay is visible.
    show_help: bool,
}

impl App {
    pub(crate) fn new(runtime: Runtime, backend: Backend) -> Result<Self> {
        Ok(Self {
            runtime,
            backend,
            chat: ChatScreen::new()?,
            should_quit: false,
            status: "Ready · press ? for help".to_string(),
            show_help: false,
        })
    }
}

/// Entry point: sets up terminal, runs event loop, restores terminal.
pub(crate) fn run(app: App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    loop {
        terminal.draw(|f| draw(f, &app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(&mut app, key.code, key.modifiers);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    // Global keybindings
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('q') if !app.chat.is_editing() => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('?') if !app.chat.is_editing() => {
            app.show_help = !app.show_help;
            return;
        }
        _ => {}
    }

    // Any key dismisses help.
    if app.show_help {
        app.show_help = false;
        return;
    }

    let session = Session {
        runtime: &app.runtime,
        backend: &app.backend,
    };
    if let Some(status) = app.chat.handle_key(code, &session) {
        app.status = status;
    }
}

fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(1),    // Conversation
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    let wizard = app.chat.wizard();
    let header = Paragraph::new(Line::from(vec![
        Span::styled(app.backend.describe(), Style::default().fg(Color::Cyan)),
        Span::raw(" · "),
        Span::raw(wizard.state().to_string()),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" ServiceFunnel "),
    );
    f.render_widget(header, chunks[0]);

    app.chat.draw(f, chunks[1]);

    f.render_widget(status_bar(&app.status), chunks[2]);

    if app.show_help {
        draw_help_overlay(f);
    }
}

fn draw_help_overlay(f: &mut Frame) {
    let area = centered_rect(60, 60, f.area());

    let help_text = vec![
        Line::from("Keybindings").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(""),
        Line::from("  ?            Toggle this help"),
        Line::from("  q / Ctrl-C   Quit (Ctrl-C only while typing)"),
        Line::from(""),
        Line::from("Conversation:").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  Enter        Start / answer / continue / submit"),
        Line::from("  ↑/↓          Pick an option"),
        Line::from("  n            Start over with a new category"),
        Line::from("  Esc          Cancel a new category / close summary"),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help · press any key to close ")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));

    f.render_widget(ratatui::widgets::Clear, area);
    f.render_widget(help, area);
}
