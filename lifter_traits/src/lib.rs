pub mod clock;

pub use clock::{Clock, SystemClock};

/// One of the two relay lines wired to the lift controller's buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    Up,
    Down,
}

impl Line {
    pub const ALL: [Line; 2] = [Line::Up, Line::Down];

    pub fn as_str(self) -> &'static str {
        match self {
            Line::Up => "up",
            Line::Down => "down",
        }
    }
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Button-emulating actuator for the lift motor.
///
/// `drive` asserts a line (button pressed), `release` returns it to its
/// inactive or high-impedance state. Implementations must tolerate
/// `release` on a line that is already released.
pub trait Actuator {
    fn drive(&mut self, line: Line) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn release(&mut self, line: Line) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Release both lines, attempting each even if the first fails.
    fn release_all(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let up = self.release(Line::Up);
        let down = self.release(Line::Down);
        up.and(down)
    }
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn drive(&mut self, line: Line) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).drive(line)
    }
    fn release(&mut self, line: Line) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).release(line)
    }
    fn release_all(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).release_all()
    }
}
