use crate::value::Value;

/// The stack of data frames a render resolves names against.
///
/// Frames are borrowed from the caller's root value; the stack only ever
/// pushes and pops references, it never mutates the data.
#[derive(Debug, Clone)]
pub struct ContextStack<'a> {
    frames: Vec<&'a Value>,
}

impl<'a> ContextStack<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self { frames: vec![root] }
    }

    pub fn push(&mut self, frame: &'a Value) {
        self.frames.push(frame);
    }

    /// Pops the top frame. The root frame is never removed.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn top(&self) -> Option<&'a Value> {
        self.frames.last().copied()
    }

    pub fn root(&self) -> Option<&'a Value> {
        self.frames.first().copied()
    }

    /// Resolves a name or dotted path.
    ///
    /// `.` is the top frame. Otherwise the first segment is looked up from
    /// the top frame outward and the nearest frame holding it wins; the
    /// remaining segments must then resolve inside that value.
    pub fn resolve(&self, name: &str) -> Option<&'a Value> {
        if name == "." {
            return self.top();
        }

        let mut segments = name.split('.');
        let first = segments.next()?;
        let mut value = self.frames.iter().rev().find_map(|frame| frame.get(first))?;
        for segment in segments {
            value = value.get(segment)?;
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Value {
        Value::map([
            ("name", Value::from("root")),
            ("person", Value::map([("name", "Ada"), ("lang", "en")])),
            ("empty", Value::map([("other", 1)])),
        ])
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_nearest_frame_wins() {
        let root = data();
        let mut stack = ContextStack::new(&root);
        assert_eq!(stack.resolve("name"), Some(&Value::from("root")));

        let person = root.get("person").unwrap();
        stack.push(person);
        assert_eq!(stack.resolve("name"), Some(&Value::from("Ada")));
        assert_eq!(stack.resolve("lang"), Some(&Value::from("en")));

        stack.pop();
        assert_eq!(stack.resolve("name"), Some(&Value::from("root")));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_dotted_path_does_not_fall_through() {
        let root = data();
        let mut stack = ContextStack::new(&root);
        assert_eq!(stack.resolve("person.name"), Some(&Value::from("Ada")));

        // `empty` is found in the root frame, so `name` must resolve inside
        // it and never against the pushed `person` frame.
        stack.push(root.get("person").unwrap());
        assert_eq!(stack.resolve("empty.name"), None);
        assert_eq!(stack.resolve("missing.name"), None);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_dot_is_top_frame() {
        let root = data();
        let item = Value::from("x");
        let mut stack = ContextStack::new(&root);
        stack.push(&item);
        assert_eq!(stack.resolve("."), Some(&item));
        // Non-map frames are skipped for named lookups.
        assert_eq!(stack.resolve("name"), Some(&Value::from("root")));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_root_frame_is_never_popped() {
        let root = data();
        let mut stack = ContextStack::new(&root);
        stack.pop();
        stack.pop();
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.root(), Some(&root));
    }
}
