use anyhow::Result;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    PointerMove,
    PointerDown,
    KeyDown,
    Message,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    Left,
    Right,
    Up,
    Down,
    Char(char),
    Escape,
    Interrupt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerMove { x: u16, y: u16 },
    PointerDown { x: u16, y: u16 },
    KeyDown(Key),
    Message(Value),
}

impl InputEvent {
    pub fn kind(&self) -> InputKind {
        match self {
            Self::PointerMove { .. } => InputKind::PointerMove,
            Self::PointerDown { .. } => InputKind::PointerDown,
            Self::KeyDown(_) => InputKind::KeyDown,
            Self::Message(_) => InputKind::Message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Debug, Default)]
pub struct Listeners {
    entries: Vec<(ListenerId, InputKind)>,
    next_id: u64,
}

impl Listeners {
    pub fn add(&mut self, kind: InputKind) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, kind));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub fn wants(&self, kind: InputKind) -> bool {
        self.entries.iter().any(|(_, entry)| *entry == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub trait InputSource {
    fn subscribe(&mut self, kind: InputKind) -> ListenerId;
    fn unsubscribe(&mut self, id: ListenerId) -> bool;
    fn listener_count(&self) -> usize;
    fn poll(&mut self, timeout: Duration) -> Result<Option<InputEvent>>;
}

pub struct TerminalInput {
    listeners: Listeners,
    messages: Option<Receiver<String>>,
}

impl TerminalInput {
    pub fn new(messages: Option<Receiver<String>>) -> Self {
        Self {
            listeners: Listeners::default(),
            messages,
        }
    }

    pub fn spawn_line_reader<R>(reader: R) -> Receiver<String>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "message reader stopped");
                        break;
                    }
                }
            }
            debug!("message reader reached end of input");
        });
        rx
    }

    fn next_message(&mut self) -> Option<InputEvent> {
        let receiver = self.messages.as_ref()?;
        loop {
            match receiver.try_recv() {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Value>(&line) {
                        Ok(value) => return Some(InputEvent::Message(value)),
                        Err(err) => {
                            debug!(error = %err, "ignoring non-JSON message line");
                            continue;
                        }
                    }
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    self.messages = None;
                    return None;
                }
            }
        }
    }
}

impl InputSource for TerminalInput {
    fn subscribe(&mut self, kind: InputKind) -> ListenerId {
        self.listeners.add(kind)
    }

    fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<InputEvent>> {
        if self.listeners.wants(InputKind::Message)
            && let Some(message) = self.next_message()
        {
            return Ok(Some(message));
        }

        if !event::poll(timeout)? {
            return Ok(None);
        }

        let Some(mapped) = map_terminal_event(event::read()?) else {
            return Ok(None);
        };
        // Ctrl+C always reaches the run loop so the overlay can be closed.
        if mapped == InputEvent::KeyDown(Key::Interrupt) || self.listeners.wants(mapped.kind()) {
            return Ok(Some(mapped));
        }
        Ok(None)
    }
}

pub fn map_terminal_event(event: Event) -> Option<InputEvent> {
    match event {
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) => Some(InputEvent::PointerMove {
                x: mouse.column,
                y: mouse.row,
            }),
            MouseEventKind::Down(MouseButton::Left) => Some(InputEvent::PointerDown {
                x: mouse.column,
                y: mouse.row,
            }),
            _ => None,
        },
        Event::Key(key) => map_key(key).map(InputEvent::KeyDown),
        _ => None,
    }
}

fn map_key(key: KeyEvent) -> Option<Key> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let mapped = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Key::Interrupt,
        KeyCode::Char(' ') => Key::Space,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Esc => Key::Escape,
        KeyCode::Char(ch) => Key::Char(ch),
        _ => return None,
    };
    Some(mapped)
}

#[derive(Debug, Default)]
pub struct ScriptedInput {
    listeners: Listeners,
    events: VecDeque<InputEvent>,
    dropped: usize,
}

impl ScriptedInput {
    pub fn new(events: impl IntoIterator<Item = InputEvent>) -> Self {
        Self {
            listeners: Listeners::default(),
            events: events.into_iter().collect(),
            dropped: 0,
        }
    }

    pub fn push(&mut self, event: InputEvent) {
        self.events.push_back(event);
    }

    pub fn pending(&self) -> usize {
        self.events.len()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl InputSource for ScriptedInput {
    fn subscribe(&mut self, kind: InputKind) -> ListenerId {
        self.listeners.add(kind)
    }

    fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn poll(&mut self, _timeout: Duration) -> Result<Option<InputEvent>> {
        while let Some(event) = self.events.pop_front() {
            if self.listeners.wants(event.kind()) {
                return Ok(Some(event));
            }
            self.dropped += 1;
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventState, MouseEvent};
    use std::io::Cursor;
    use std::time::Instant;

    #[test]
    fn scripted_input_drops_unlistened_kinds() {
        let mut input = ScriptedInput::new([
            InputEvent::PointerMove { x: 1, y: 2 },
            InputEvent::KeyDown(Key::Space),
        ]);
        input.subscribe(InputKind::KeyDown);

        let event = input.poll(Duration::ZERO).expect("poll");
        assert_eq!(event, Some(InputEvent::KeyDown(Key::Space)));
        assert_eq!(input.dropped(), 1);
        assert_eq!(input.poll(Duration::ZERO).expect("poll"), None);
    }

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let mut listeners = Listeners::default();
        let a = listeners.add(InputKind::KeyDown);
        let b = listeners.add(InputKind::KeyDown);
        assert!(listeners.remove(a));
        assert!(listeners.wants(InputKind::KeyDown));
        assert!(listeners.remove(b));
        assert!(!listeners.wants(InputKind::KeyDown));
        assert!(listeners.is_empty());
    }

    #[test]
    fn maps_mouse_motion_to_pointer_move() {
        let event = Event::Mouse(MouseEvent {
            kind: MouseEventKind::Moved,
            column: 12,
            row: 4,
            modifiers: KeyModifiers::NONE,
        });
        assert_eq!(
            map_terminal_event(event),
            Some(InputEvent::PointerMove { x: 12, y: 4 })
        );
    }

    #[test]
    fn maps_space_press_and_ignores_release() {
        let press = KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE);
        assert_eq!(
            map_terminal_event(Event::Key(press)),
            Some(InputEvent::KeyDown(Key::Space))
        );

        let release = KeyEvent {
            code: KeyCode::Char(' '),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(map_terminal_event(Event::Key(release)), None);
    }

    #[test]
    fn ctrl_c_maps_to_interrupt() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(
            map_terminal_event(Event::Key(key)),
            Some(InputEvent::KeyDown(Key::Interrupt))
        );
    }

    #[test]
    fn line_reader_forwards_lines_until_eof() {
        let rx = TerminalInput::spawn_line_reader(Cursor::new(
            "{\"eventName\":\"loadProgress\",\"loadFraction\":0.25}\n\nnope\n",
        ));
        let mut input = TerminalInput::new(Some(rx));
        input.subscribe(InputKind::Message);

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut received = None;
        while Instant::now() < deadline && received.is_none() {
            received = input.next_message();
            if received.is_none() {
                thread::sleep(Duration::from_millis(5));
            }
        }

        let Some(InputEvent::Message(value)) = received else {
            panic!("expected a message event");
        };
        assert_eq!(value["loadFraction"], 0.25);
    }
}
