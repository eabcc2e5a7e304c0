// Terminal host - library list, detail view, footer player
// Input plumbing (listeners, key binder, drag) works without a terminal;
// rendering and the app loop need the `tui` feature.

#[cfg(all(feature = "tui", feature = "audio"))]
mod app; // application state and event loop
pub mod drag; // pointer-drag volume gesture
pub mod events; // input events and scoped listeners

#[cfg(all(feature = "tui", feature = "audio"))]
pub use app::App;
pub use drag::{ControlGeometry, DragSession, VolumeDrag};
pub use events::{
    Action, BinderMode, Dispatch, EventKind, InputEvent, KeyboardNavigationBinder, ListenerGuard,
    ListenerRegistry, PointerEvent, PointerKind, Response,
};

#[cfg(feature = "tui")]
pub use terminal::TerminalManager;

#[cfg(feature = "tui")]
mod terminal {
    use anyhow::Result;
    use crossterm::{
        cursor,
        event::{DisableMouseCapture, EnableMouseCapture},
        execute,
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    };
    use ratatui::{backend::CrosstermBackend, layout::Rect, Frame, Terminal};
    use std::io;

    /// Raw mode + alternate screen + mouse capture for as long as it lives
    pub struct TerminalManager {
        terminal: Terminal<CrosstermBackend<io::Stdout>>,
        _restore: RestoreGuard,
    }

    struct RestoreGuard;

    impl Drop for RestoreGuard {
        fn drop(&mut self) {
            // stdout may already be gone; every step is best effort
            let _ = disable_raw_mode();
            let mut stdout = io::stdout();
            let _ = execute!(stdout, LeaveAlternateScreen, DisableMouseCapture, cursor::Show);
        }
    }

    impl TerminalManager {
        pub fn new() -> Result<Self> {
            // a previous crash can leave the terminal half set up
            let _ = disable_raw_mode();
            let mut stdout = io::stdout();
            let _ = execute!(stdout, LeaveAlternateScreen, DisableMouseCapture);

            enable_raw_mode()?;
            execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
            let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
            terminal.clear()?;

            Ok(Self {
                terminal,
                _restore: RestoreGuard,
            })
        }

        pub fn draw<F>(&mut self, f: F) -> Result<()>
        where
            F: FnOnce(&mut Frame),
        {
            self.terminal.draw(f)?;
            Ok(())
        }

        pub fn size(&self) -> Result<Rect> {
            let size = self.terminal.size()?;
            Ok(Rect::new(0, 0, size.width, size.height))
        }
    }

    impl Drop for TerminalManager {
        fn drop(&mut self) {
            let _ = self.terminal.clear();
            let _ = self.terminal.show_cursor();
        }
    }
}
