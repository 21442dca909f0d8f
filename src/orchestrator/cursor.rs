/// Gate that holds back stages until the resume target is reached.
///
/// Starts armed when a resume target is given. The first stage whose id
/// matches disarms it and is itself admitted; the cursor never re-arms.
#[derive(Debug, Clone)]
pub struct ResumeCursor {
    target: Option<String>,
    armed: bool,
}

impl ResumeCursor {
    pub fn new(resume_from: Option<&str>) -> Self {
        Self {
            target: resume_from.map(str::to_string),
            armed: resume_from.is_some(),
        }
    }

    /// Returns true when `stage_id` may run as far as resume position is concerned.
    pub fn admit(&mut self, stage_id: &str) -> bool {
        if !self.armed {
            return true;
        }
        if self.target.as_deref() == Some(stage_id) {
            self.armed = false;
            return true;
        }
        false
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }
}
