use eduassist_core::{Completion, Session};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::tui::AppEvent;

pub struct App {
    pub should_quit: bool,
    pub session: Session,

    // Input box
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Transcript view
    pub scroll: u16,
    pub follow_bottom: bool,
    pub chat_height: u16, // Inner height of the transcript pane, set during render
    pub chat_width: u16,  // Inner width of the transcript pane, set during render
    pub transcript_lines: u16, // Wrapped height of the transcript, set during render

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    request_task: Option<JoinHandle<()>>,
    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(session: Session, events: UnboundedSender<AppEvent>) -> Self {
        Self {
            should_quit: false,
            session,
            input: String::new(),
            cursor: 0,
            scroll: 0,
            follow_bottom: true,
            chat_height: 0,
            chat_width: 0,
            transcript_lines: 0,
            animation_frame: 0,
            request_task: None,
            events,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.session.is_pending()
    }

    /// Send the input box contents. Blank input is dropped; input typed while
    /// a reply is pending stays in the box.
    pub fn submit(&mut self) {
        let Some(pending) = self.session.begin(&self.input) else {
            if self.input.trim().is_empty() {
                self.clear_input();
            }
            return;
        };
        self.clear_input();
        self.follow_bottom = true;

        let gateway = self.session.gateway().clone();
        let events = self.events.clone();
        self.request_task = Some(tokio::spawn(async move {
            let completion = pending.run(&gateway).await;
            let _ = events.send(AppEvent::Completed {
                id: pending.id,
                completion,
            });
        }));
    }

    pub fn on_completed(&mut self, id: u64, completion: Completion) {
        if self.session.finish(id, &completion) {
            self.request_task = None;
            self.follow_bottom = true;
        }
    }

    /// Abort the outstanding request, if any. Returns whether there was one.
    pub fn cancel(&mut self) -> bool {
        if let Some(task) = self.request_task.take() {
            task.abort();
        }
        if self.session.cancel() {
            self.follow_bottom = true;
            true
        } else {
            false
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Input editing
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn delete_before_cursor(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete_at_cursor(&mut self) {
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    fn clear_input(&mut self) {
        self.input.clear();
        self.cursor = 0;
    }

    // Transcript scrolling
    pub fn max_scroll(&self) -> u16 {
        self.transcript_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.scroll = self.scroll.saturating_add(lines).min(max);
        self.follow_bottom = self.scroll >= max;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn page_down(&mut self) {
        self.scroll_down((self.chat_height / 2).max(1));
    }

    pub fn page_up(&mut self) {
        self.scroll_up((self.chat_height / 2).max(1));
    }

    /// Pin the view to the newest turn when following
    pub fn sync_scroll(&mut self) {
        let max = self.max_scroll();
        if self.follow_bottom || self.scroll > max {
            self.scroll = max;
        }
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
