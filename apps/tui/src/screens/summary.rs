//! Contact summary modal.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use servicefunnel_core::{ContactSubmission, Wizard};

use crate::widgets::centered_rect;

/// Draw the summary over `area`. Before submission it lists what will be
/// sent; afterwards it shows the closing message.
pub(super) fn draw(
    f: &mut Frame,
    area: Rect,
    wizard: &Wizard,
    submission: Option<&ContactSubmission>,
) {
    let popup = centered_rect(60, 60, area);
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Service ID: ", bold),
            Span::raw(wizard.service_id().unwrap_or("-")),
        ]),
        Line::from(vec![
            Span::styled("Category:   ", bold),
            Span::raw(wizard.category_id()),
        ]),
        Line::from(""),
    ];
    lines.extend(wizard.contact().rows().map(|(label, value)| {
        Line::from(vec![
            Span::styled(format!("{label:<14}"), bold),
            Span::raw(value),
        ])
    }));
    lines.push(Line::from(""));

    let title = match submission {
        Some(sub) => {
            if let Some(last) = wizard.transcript().last() {
                lines.push(Line::from(Span::styled(
                    last.content.as_str(),
                    Style::default().fg(Color::Green),
                )));
            }
            lines.push(Line::from(format!("Session {}", sub.session_id)).dim());
            " Submitted · Enter/Esc to close "
        }
        None => " Summary · Enter to submit ",
    };

    let summary = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup);
    f.render_widget(summary, popup);
}
