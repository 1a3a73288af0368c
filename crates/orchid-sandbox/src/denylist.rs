//! Textual denylist applied before any code executes
//!
//! The screen is a plain substring match over the source. It catches the
//! obvious escape hatches (dynamic code construction, module loading,
//! host/global object access, network APIs, prototype-chain walking) and
//! nothing more; obfuscated code can get past it. Callers must treat a
//! pass as "not obviously hostile", not "safe".

/// Constructs that fail the screen
pub const DENYLIST: &[&str] = &[
    // dynamic code construction
    "eval(",
    "eval (",
    "Function(",
    "Function (",
    "new Function",
    "GeneratorFunction",
    "AsyncFunction",
    // module / process access
    "require(",
    "require (",
    "import(",
    "import (",
    "process.",
    "child_process",
    // host globals
    "global.",
    "globalThis",
    "window.",
    "document.",
    // network I/O
    "XMLHttpRequest",
    "fetch(",
    "fetch (",
    "WebSocket",
    // prototype-chain access
    "__proto__",
    "prototype.constructor",
    "constructor.constructor",
    "constructor[",
];

/// Return the first denylisted construct found in `code`, if any
pub fn screen(code: &str) -> Option<&'static str> {
    DENYLIST.iter().find(|token| code.contains(**token)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_eval() {
        assert_eq!(screen("const x = eval('1+1');"), Some("eval("));
    }

    #[test]
    fn flags_prototype_walk() {
        assert!(screen("({}).__proto__.polluted = 1").is_some());
        assert!(screen("x.constructor.constructor('return 1')()").is_some());
    }

    #[test]
    fn flags_network_and_process() {
        assert!(screen("fetch('https://example.com')").is_some());
        assert!(screen("process.exit(1)").is_some());
    }

    #[test]
    fn passes_plain_code() {
        assert_eq!(screen("return input.toUpperCase();"), None);
        assert_eq!(screen("const evaluation = 1; return evaluation;"), None);
    }
}
