use std::fmt;

/// Called with the last zoom scale once zooming has been idle for the window.
pub type SettleHook = Box<dyn FnMut(f64)>;

/// Coalesces bursts of zoom events: each event pushes the deadline back, and
/// the settle hook fires once when the deadline passes without a new event.
///
/// The hook is empty unless the host installs one.
pub struct ZoomDebounce {
    window_ms: f64,
    deadline: Option<f64>,
    scale: f64,
    hook: Option<SettleHook>,
}

impl ZoomDebounce {
    pub fn new(window_ms: f64) -> Self {
        Self {
            window_ms,
            deadline: None,
            scale: 1.0,
            hook: None,
        }
    }

    pub fn set_window(&mut self, window_ms: f64) {
        self.window_ms = window_ms;
    }

    pub fn set_hook<F>(&mut self, hook: F)
    where
        F: FnMut(f64) + 'static,
    {
        self.hook = Some(Box::new(hook));
    }

    pub fn clear_hook(&mut self) {
        self.hook = None;
    }

    /// Record a zoom event at `now_ms`.
    pub fn arm(&mut self, now_ms: f64, scale: f64) {
        self.deadline = Some(now_ms + self.window_ms);
        self.scale = scale;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Fire the hook if the window has elapsed. Returns whether it settled.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        match self.deadline {
            Some(deadline) if now_ms >= deadline => {
                self.deadline = None;
                if let Some(hook) = self.hook.as_mut() {
                    hook(self.scale);
                }
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for ZoomDebounce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoomDebounce")
            .field("window_ms", &self.window_ms)
            .field("deadline", &self.deadline)
            .field("scale", &self.scale)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
