use std::sync::Arc;

use ratatui::layout::Rect;
use stoichiometrix_core::dispatch::dispatch;
use stoichiometrix_core::{
    Button, MessageBody, ModelBackend, RemoteRequest, RenderCommand, Sender, Session, SessionEvent,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WelcomeField {
    Nickname,
    Age,
}

/// A rendered message bubble
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub sender: Sender,
    pub body: MessageBody,
}

/// Something clickable drawn in the last frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Bubble,
    Close,
    /// Index into all rendered buttons, in order
    Button(usize),
}

impl ChatEntry {
    pub fn buttons(&self) -> &[Button] {
        match &self.body {
            MessageBody::Buttons(buttons) => buttons,
            MessageBody::Text(_) => &[],
        }
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub session: Session,
    backend: Arc<dyn ModelBackend>,
    events: UnboundedSender<AppEvent>,
    pub model_name: String,

    // Widget visibility
    pub container_open: bool,
    pub welcome_visible: bool,
    pub alert: Option<String>,

    // Welcome form
    pub welcome_field: WelcomeField,
    pub nickname_input: String,
    pub age_input: String,

    // Chat body
    pub messages: Vec<ChatEntry>,
    pub typing: bool,
    pub selected_button: Option<usize>, // index into all rendered buttons, in order
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of chat area, for scroll calculations
    pub chat_width: u16,  // inner width of chat area, for wrap calculations
    pub chat_area: Option<Rect>,
    pub hit_areas: Vec<(Rect, HitTarget)>, // rebuilt on every draw

    // Message input
    pub chat_input: String,
    pub chat_cursor: usize, // cursor position in chat_input, in chars

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(backend: Arc<dyn ModelBackend>, events: UnboundedSender<AppEvent>) -> Self {
        let model_name = backend.model().to_string();
        let session = Session::new();

        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            container_open: session.is_open(),
            welcome_visible: session.welcome_visible(),
            session,
            backend,
            events,
            model_name,

            alert: None,

            welcome_field: WelcomeField::Nickname,
            nickname_input: String::new(),
            age_input: String::new(),

            messages: Vec::new(),
            typing: false,
            selected_button: None,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,
            hit_areas: Vec::new(),

            chat_input: String::new(),
            chat_cursor: 0,

            animation_frame: 0,
        }
    }

    /// Feed an event to the session, draw what it asks for and start any request it needs.
    pub fn apply(&mut self, event: SessionEvent) {
        let step = self.session.handle(event);
        for command in step.commands {
            self.render_command(command);
        }
        if let Some(request) = step.request {
            self.spawn_dispatch(request);
        }
    }

    fn spawn_dispatch(&self, request: RemoteRequest) {
        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = dispatch(backend.as_ref(), request).await;
            if events.send(AppEvent::Remote(outcome)).is_err() {
                tracing::debug!("UI closed before the reply arrived");
            }
        });
    }

    fn render_command(&mut self, command: RenderCommand) {
        match command {
            RenderCommand::OpenContainer => {
                self.container_open = true;
                self.scroll_to_bottom();
            }
            RenderCommand::CloseContainer => {
                self.container_open = false;
                self.input_mode = InputMode::Normal;
            }
            RenderCommand::ClearWelcomeInputs => {
                self.nickname_input.clear();
                self.age_input.clear();
                self.welcome_field = WelcomeField::Nickname;
            }
            RenderCommand::HideWelcome => {
                self.welcome_visible = false;
                self.input_mode = InputMode::Editing;
            }
            RenderCommand::Alert(text) => self.alert = Some(text),
            RenderCommand::Append { sender, body } => {
                if let MessageBody::Buttons(_) = &body {
                    // Newest group gets the selection
                    self.selected_button = Some(self.button_count());
                }
                self.messages.push(ChatEntry { sender, body });
                self.scroll_to_bottom();
            }
            RenderCommand::ShowTyping => {
                self.typing = true;
                self.scroll_to_bottom();
            }
            RenderCommand::RemoveTyping => self.typing = false,
        }
    }

    // Welcome form

    pub fn start_learning(&mut self) {
        self.apply(SessionEvent::StartLearning {
            nickname: self.nickname_input.clone(),
            age: self.age_input.clone(),
        });
    }

    pub fn toggle_welcome_field(&mut self) {
        self.welcome_field = match self.welcome_field {
            WelcomeField::Nickname => WelcomeField::Age,
            WelcomeField::Age => WelcomeField::Nickname,
        };
    }

    pub fn welcome_input_mut(&mut self) -> &mut String {
        match self.welcome_field {
            WelcomeField::Nickname => &mut self.nickname_input,
            WelcomeField::Age => &mut self.age_input,
        }
    }

    // Sending

    /// Send the typed message. The input is kept if the session refuses it
    /// because a reply is still pending.
    pub fn submit_chat_input(&mut self) {
        if self.chat_input.trim().is_empty() {
            return;
        }
        if self.session.is_busy() {
            return;
        }
        let message = std::mem::take(&mut self.chat_input);
        self.chat_cursor = 0;
        self.apply(SessionEvent::UserSent(message));
    }

    // Buttons

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.messages.iter().flat_map(|entry| entry.buttons())
    }

    pub fn button_count(&self) -> usize {
        self.buttons().count()
    }

    pub fn select_next_button(&mut self) {
        let len = self.button_count();
        if len > 0 {
            let i = self.selected_button.unwrap_or(0);
            self.selected_button = Some((i + 1).min(len - 1));
        }
    }

    pub fn select_prev_button(&mut self) {
        if self.button_count() > 0 {
            let i = self.selected_button.unwrap_or(0);
            self.selected_button = Some(i.saturating_sub(1));
        }
    }

    /// Press the selected button as if its value had been typed.
    /// Returns false when there is nothing to press or a reply is pending.
    pub fn press_selected_button(&mut self) -> bool {
        if self.session.is_busy() {
            return false;
        }
        let value = match self.selected_button.and_then(|i| self.buttons().nth(i)) {
            Some(button) => button.value.clone(),
            None => return false,
        };
        self.apply(SessionEvent::ButtonPressed(value));
        true
    }

    /// React to a left click on something drawn in the last frame
    pub fn click(&mut self, target: HitTarget) {
        match target {
            HitTarget::Bubble => self.apply(SessionEvent::BubbleClicked),
            HitTarget::Close => self.apply(SessionEvent::CloseClicked),
            HitTarget::Button(index) => {
                if index < self.button_count() {
                    self.selected_button = Some(index);
                    self.press_selected_button();
                }
            }
        }
    }

    // Scrolling

    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.typing {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Scroll chat to bottom so the newest message is visible
    pub fn scroll_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let wrapped = |char_count: usize| -> u16 {
            if char_count == 0 {
                1
            } else {
                u16::try_from(char_count / wrap_width + 1).unwrap_or(u16::MAX)
            }
        };

        let mut total_lines: u16 = 0;

        for entry in &self.messages {
            total_lines = total_lines.saturating_add(1); // Sender line
            match &entry.body {
                MessageBody::Text(text) => {
                    for line in text.lines() {
                        total_lines = total_lines.saturating_add(wrapped(line.chars().count()));
                    }
                }
                MessageBody::Buttons(buttons) => {
                    // Buttons render as "[ label ] " and flow onto extra rows when needed
                    let chars: usize = buttons.iter().map(|b| b.label.chars().count() + 5).sum();
                    total_lines = total_lines.saturating_add(wrapped(chars));
                }
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        if self.typing {
            total_lines = total_lines.saturating_add(2);
        }

        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }
}
