//! Conversation screen: category input, transcript, option list and the
//! contact form, all driven by one [`Wizard`].

use color_eyre::eyre::Result;
use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use servicefunnel_core::{ContactSubmission, Role, Wizard, WizardState};

use super::Session;
use super::summary;
use crate::widgets::input_box;

pub(crate) struct ChatScreen {
    wizard: Wizard,
    /// Text being typed: a category ID or the current contact field.
    input: String,
    /// Highlighted option while in the funnel.
    selected: usize,
    /// Typing a new category over an existing conversation.
    choosing_category: bool,
    /// Set once the summary is confirmed; cleared when the modal is closed.
    submission: Option<ContactSubmission>,
}

impl ChatScreen {
    pub(crate) fn new() -> Result<Self> {
        let mut wizard = Wizard::new();
        wizard.open()?;
        Ok(Self {
            wizard,
            input: String::new(),
            selected: 0,
            choosing_category: false,
            submission: None,
        })
    }

    pub(crate) fn wizard(&self) -> &Wizard {
        &self.wizard
    }

    fn entering_category(&self) -> bool {
        self.choosing_category || self.wizard.state() == WizardState::AwaitingCategory
    }

    fn modal_visible(&self) -> bool {
        self.wizard.state() == WizardState::ShowingSummary || self.submission.is_some()
    }

    /// Whether keystrokes are going into a text field.
    pub(crate) fn is_editing(&self) -> bool {
        if self.modal_visible() {
            return false;
        }
        self.entering_category()
            || matches!(self.wizard.state(), WizardState::CollectingContact { .. })
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    /// Handle a key; returns a new status line when there is something to say.
    pub(crate) fn handle_key(&mut self, code: KeyCode, session: &Session<'_>) -> Option<String> {
        if self.modal_visible() {
            return self.handle_summary_key(code);
        }
        if self.entering_category() {
            return self.handle_category_key(code, session);
        }

        match self.wizard.state() {
            WizardState::InFunnel { .. } => self.handle_option_key(code, session),
            WizardState::CollectingContact { .. } => self.handle_contact_key(code),
            WizardState::Closed => match code {
                KeyCode::Char('n') => Some(self.begin_new_category()),
                _ => None,
            },
            _ => None,
        }
    }

    fn begin_new_category(&mut self) -> String {
        self.choosing_category = true;
        self.input.clear();
        "Enter a category ID to start over (Esc to go back)".to_string()
    }

    fn handle_category_key(&mut self, code: KeyCode, session: &Session<'_>) -> Option<String> {
        match code {
            KeyCode::Char(c) => {
                self.input.push(c);
                None
            }
            KeyCode::Backspace => {
                self.input.pop();
                None
            }
            KeyCode::Esc if self.choosing_category => {
                self.choosing_category = false;
                self.input.clear();
                Some("Back to the conversation".to_string())
            }
            KeyCode::Enter => {
                let category = self.input.trim().to_string();
                match session
                    .runtime
                    .block_on(self.wizard.start(session.backend, &category))
                {
                    Ok(()) => {
                        self.input.clear();
                        self.selected = 0;
                        self.choosing_category = false;
                        Some(format!("Category {category}: pick an answer with ↑/↓ and Enter"))
                    }
                    Err(e) => Some(format!("Error: {e}")),
                }
            }
            _ => None,
        }
    }

    fn handle_option_key(&mut self, code: KeyCode, session: &Session<'_>) -> Option<String> {
        let count = self.wizard.options().len();
        match code {
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                None
            }
            KeyCode::Down => {
                if self.selected + 1 < count {
                    self.selected += 1;
                }
                None
            }
            KeyCode::Char('n') => Some(self.begin_new_category()),
            KeyCode::Enter => {
                let option = self.wizard.options().get(self.selected)?.clone();
                match session
                    .runtime
                    .block_on(self.wizard.choose(session.backend, &option))
                {
                    Ok(()) => {
                        self.selected = 0;
                        self.wizard
                            .service_id()
                            .map(|id| format!("Matched service {id}: a few contact details"))
                    }
                    Err(e) => Some(format!("Error: {e}")),
                }
            }
            _ => None,
        }
    }

    fn handle_contact_key(&mut self, code: KeyCode) -> Option<String> {
        match code {
            KeyCode::Char(c) => {
                self.input.push(c);
                None
            }
            KeyCode::Backspace => {
                self.input.pop();
                None
            }
            KeyCode::Enter => match self.wizard.submit_field(&self.input) {
                Ok(()) => {
                    self.input.clear();
                    (self.wizard.state() == WizardState::ShowingSummary)
                        .then(|| "Check your details and press Enter to submit".to_string())
                }
                Err(e) => Some(format!("Error: {e}")),
            },
            _ => None,
        }
    }

    fn handle_summary_key(&mut self, code: KeyCode) -> Option<String> {
        if self.submission.is_some() {
            return match code {
                KeyCode::Enter | KeyCode::Esc => {
                    self.submission = None;
                    Some(self.begin_new_category())
                }
                _ => None,
            };
        }

        match code {
            KeyCode::Enter => match self.wizard.confirm() {
                Ok(submission) => {
                    let status = format!("Submitted for service {}", submission.service_id);
                    self.submission = Some(submission);
                    Some(status)
                }
                Err(e) => Some(format!("Error: {e}")),
            },
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect) {
        let bottom_height = match self.wizard.state() {
            WizardState::InFunnel { .. } if !self.entering_category() => {
                self.wizard.options().len().min(8) as u16 + 2
            }
            _ => 3,
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),                // Transcript
                Constraint::Length(bottom_height), // Options or input
                Constraint::Length(1),             // Key hint
            ])
            .split(area);

        self.draw_transcript(f, chunks[0]);
        self.draw_bottom(f, chunks[1]);

        let hint = Paragraph::new(self.hint())
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        f.render_widget(hint, chunks[2]);

        if self.modal_visible() {
            summary::draw(f, area, &self.wizard, self.submission.as_ref());
        }
    }

    fn draw_transcript(&self, f: &mut Frame, area: Rect) {
        let lines: Vec<Line> = self
            .wizard
            .transcript()
            .iter()
            .map(|m| match m.role {
                Role::Bot => Line::from(vec![
                    Span::styled("Bot: ", Style::default().fg(Color::Cyan).bold()),
                    Span::raw(m.content.as_str()),
                ]),
                Role::User => Line::from(vec![
                    Span::styled("You: ", Style::default().fg(Color::Yellow).bold()),
                    Span::raw(m.content.as_str()),
                ]),
            })
            .collect();

        // Keep the newest lines in view.
        let visible = area.height.saturating_sub(2);
        let scroll = (lines.len() as u16).saturating_sub(visible);

        let title = match self.wizard.category_id() {
            "" => " Conversation ".to_string(),
            id => format!(" Conversation · category {id} "),
        };
        let transcript = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0));
        f.render_widget(transcript, area);
    }

    fn draw_bottom(&self, f: &mut Frame, area: Rect) {
        if self.entering_category() {
            let widget = input_box("Category ID", &self.input, "e.g. 1", true);
            f.render_widget(widget, area);
            return;
        }

        match self.wizard.state() {
            WizardState::InFunnel { .. } => {
                let items: Vec<ListItem> = self
                    .wizard
                    .options()
                    .iter()
                    .map(|o| ListItem::new(o.as_str()))
                    .collect();
                let list = List::new(items)
                    .block(Block::default().borders(Borders::ALL).title(" Options "))
                    .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
                    .highlight_symbol("› ");
                let mut state = ListState::default().with_selected(Some(self.selected));
                f.render_stateful_widget(list, area, &mut state);
            }
            WizardState::CollectingContact { .. } => {
                if let Some(field) = self.wizard.current_field() {
                    let widget = input_box(field.label, &self.input, field.placeholder, true);
                    f.render_widget(widget, area);
                }
            }
            _ => {
                let done = Paragraph::new("Conversation closed.")
                    .block(Block::default().borders(Borders::ALL));
                f.render_widget(done, area);
            }
        }
    }

    fn hint(&self) -> &'static str {
        if self.modal_visible() {
            return if self.submission.is_some() {
                "Enter/Esc to close"
            } else {
                "Enter to submit"
            };
        }
        if self.choosing_category {
            return "Type a category ID · Enter to start · Esc to go back";
        }
        match self.wizard.state() {
            WizardState::AwaitingCategory => "Type a category ID · Enter to start",
            WizardState::InFunnel { .. } => "↑/↓ to pick · Enter to answer · n for a new category",
            WizardState::CollectingContact { .. } => "Type your answer · Enter to continue",
            WizardState::Closed => "n for a new category · q to quit",
            _ => "",
        }
    }
}
