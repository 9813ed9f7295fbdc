//! Split-pane terminal renderer: a scrollback output pane over a one-line
//! input editor.
//!
//! Crossterm's event source is synchronous, so keys are read on a dedicated
//! blocking thread and funneled into the async draw loop. Enter submits the
//! input line to the session; Ctrl-C or Ctrl-D ends the surface, which
//! closes the input channel and signs the session off.

use std::collections::VecDeque;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Maximum scrollback lines kept in memory.
const MAX_LINES: usize = 1000;

pub struct TerminalSurface {
    draw_loop: JoinHandle<()>,
}

impl TerminalSurface {
    pub fn start(
        output_rx: mpsc::UnboundedReceiver<String>,
        input_tx: mpsc::Sender<String>,
    ) -> anyhow::Result<Self> {
        let (key_tx, key_rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            while let Ok(event) = crossterm::event::read() {
                if key_tx.send(event).is_err() {
                    break;
                }
            }
        });
        let draw_loop = tokio::spawn(run(output_rx, input_tx, key_rx));
        Ok(Self { draw_loop })
    }

    pub async fn shutdown(self) {
        self.draw_loop.abort();
        let _ = self.draw_loop.await;
        ratatui::restore();
    }
}

struct Pane {
    lines: VecDeque<String>,
    input: String,
    /// Byte offset of the cursor in `input`.
    cursor: usize,
}

impl Pane {
    fn push(&mut self, line: String) {
        self.lines.push_back(line);
        if self.lines.len() > MAX_LINES {
            self.lines.pop_front();
        }
    }
}

enum KeyOutcome {
    None,
    Submit(String),
    Quit,
}

async fn run(
    mut output_rx: mpsc::UnboundedReceiver<String>,
    input_tx: mpsc::Sender<String>,
    mut key_rx: mpsc::UnboundedReceiver<Event>,
) {
    let mut terminal = ratatui::init();
    let mut pane = Pane {
        lines: VecDeque::new(),
        input: String::new(),
        cursor: 0,
    };

    loop {
        if terminal.draw(|frame| draw(frame, &pane)).is_err() {
            break;
        }
        tokio::select! {
            output = output_rx.recv() => match output {
                Some(line) => pane.push(line),
                // Session ended.
                None => break,
            },
            event = key_rx.recv() => match event {
                Some(Event::Key(key)) if key.kind != KeyEventKind::Release => {
                    match handle_key(&mut pane, key) {
                        KeyOutcome::Submit(line) => {
                            pane.push(format!("> {line}"));
                            if input_tx.send(line).await.is_err() {
                                break;
                            }
                        }
                        KeyOutcome::Quit => break,
                        KeyOutcome::None => {}
                    }
                }
                // Resizes redraw on the next pass.
                Some(_) => {}
                None => break,
            },
        }
    }
    ratatui::restore();
}

fn handle_key(pane: &mut Pane, key: KeyEvent) -> KeyOutcome {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('d') => KeyOutcome::Quit,
            KeyCode::Char('a') => {
                pane.cursor = 0;
                KeyOutcome::None
            }
            KeyCode::Char('e') => {
                pane.cursor = pane.input.len();
                KeyOutcome::None
            }
            KeyCode::Char('u') => {
                pane.input.drain(..pane.cursor);
                pane.cursor = 0;
                KeyOutcome::None
            }
            _ => KeyOutcome::None,
        };
    }

    match key.code {
        KeyCode::Enter => {
            let line = std::mem::take(&mut pane.input);
            pane.cursor = 0;
            // An empty line would read as a disconnect to the engine.
            if line.is_empty() {
                KeyOutcome::None
            } else {
                KeyOutcome::Submit(line)
            }
        }
        KeyCode::Char(c) => {
            pane.input.insert(pane.cursor, c);
            pane.cursor += c.len_utf8();
            KeyOutcome::None
        }
        KeyCode::Backspace => {
            if pane.cursor > 0 {
                let prev = prev_boundary(&pane.input, pane.cursor);
                pane.input.remove(prev);
                pane.cursor = prev;
            }
            KeyOutcome::None
        }
        KeyCode::Left => {
            pane.cursor = prev_boundary(&pane.input, pane.cursor);
            KeyOutcome::None
        }
        KeyCode::Right => {
            pane.cursor = next_boundary(&pane.input, pane.cursor);
            KeyOutcome::None
        }
        KeyCode::Home => {
            pane.cursor = 0;
            KeyOutcome::None
        }
        KeyCode::End => {
            pane.cursor = pane.input.len();
            KeyOutcome::None
        }
        _ => KeyOutcome::None,
    }
}

fn prev_boundary(s: &str, at: usize) -> usize {
    s[..at].char_indices().next_back().map(|(i, _)| i).unwrap_or(0)
}

fn next_boundary(s: &str, at: usize) -> usize {
    s[at..]
        .chars()
        .next()
        .map(|c| at + c.len_utf8())
        .unwrap_or(s.len())
}

fn draw(frame: &mut Frame, pane: &Pane) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(frame.area());

    let inner_height = chunks[0].height.saturating_sub(2) as usize;
    let start = pane.lines.len().saturating_sub(inner_height);
    let lines: Vec<Line> = pane
        .lines
        .iter()
        .skip(start)
        .map(|l| Line::from(l.as_str()))
        .collect();
    let output =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" palaver "));
    frame.render_widget(output, chunks[0]);

    let input = Paragraph::new(pane.input.as_str())
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL).title(" input "));
    frame.render_widget(input, chunks[1]);

    let cursor_x = chunks[1].x + 1 + pane.input[..pane.cursor].chars().count() as u16;
    frame.set_cursor_position((cursor_x, chunks[1].y + 1));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pane() -> Pane {
        Pane {
            lines: VecDeque::new(),
            input: String::new(),
            cursor: 0,
        }
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn typing_and_submitting_a_line() {
        let mut pane = pane();
        for c in "/quit".chars() {
            handle_key(&mut pane, press(KeyCode::Char(c)));
        }
        match handle_key(&mut pane, press(KeyCode::Enter)) {
            KeyOutcome::Submit(line) => assert_eq!(line, "/quit"),
            _ => panic!("expected a submit"),
        }
        assert!(pane.input.is_empty());
    }

    #[test]
    fn empty_enter_submits_nothing() {
        let mut pane = pane();
        assert!(matches!(
            handle_key(&mut pane, press(KeyCode::Enter)),
            KeyOutcome::None
        ));
    }

    #[test]
    fn backspace_handles_multibyte_input() {
        let mut pane = pane();
        handle_key(&mut pane, press(KeyCode::Char('é')));
        handle_key(&mut pane, press(KeyCode::Char('x')));
        handle_key(&mut pane, press(KeyCode::Backspace));
        handle_key(&mut pane, press(KeyCode::Backspace));
        assert!(pane.input.is_empty());
        assert_eq!(pane.cursor, 0);
    }

    #[test]
    fn ctrl_c_quits() {
        let mut pane = pane();
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(matches!(handle_key(&mut pane, key), KeyOutcome::Quit));
    }
}
