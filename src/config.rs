/// What the evaluator produces when an operator is applied to operands it
/// does not support, such as `-true` or `1 + false`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeErrorPolicy {
    /// Yield an `Object::Error` that stops evaluation of the enclosing program.
    Error,
    /// Yield `null` and keep going.
    Null,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub type_errors: TypeErrorPolicy,
    /// Deepest chain of nested function calls before evaluation gives up.
    pub max_call_depth: usize,
}

pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

impl Default for Config {
    fn default() -> Self {
        Self {
            type_errors: TypeErrorPolicy::Error,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl Config {
    pub fn lenient() -> Self {
        Self {
            type_errors: TypeErrorPolicy::Null,
            ..Self::default()
        }
    }

    pub fn with_type_errors(mut self, policy: TypeErrorPolicy) -> Self {
        self.type_errors = policy;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builders() {
        let config = Config::default()
            .with_type_errors(TypeErrorPolicy::Null)
            .with_max_call_depth(8);

        assert_eq!(
            config,
            Config {
                type_errors: TypeErrorPolicy::Null,
                max_call_depth: 8,
            }
        );
        assert_eq!(Config::lenient().max_call_depth, DEFAULT_MAX_CALL_DEPTH);
    }
}
