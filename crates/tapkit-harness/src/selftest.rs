//! Built-in suite exercising `Vec`, `String` and `HashMap` code.

use std::collections::HashMap;
use std::path::Path;

use tapkit::{Tap, dies, eq_ptr, eq_str, is_eq, is_none, lives, ne_str, ok};

/// Number of assertions [`run`] makes.
pub const PLAN: u32 = 24;

/// Run the suite against `tap` and return its exit code.
pub fn run(tap: &Tap) -> u8 {
    tap.plan(PLAN);
    vectors(tap);
    strings(tap);
    maps(tap);
    procfs(tap);
    crashes(tap);
    tap.done_testing()
}

fn vectors(tap: &Tap) {
    let mut v: Vec<i32> = Vec::new();
    is_eq!(tap, v.len(), 0, "new vector is empty");
    v.extend([5, 3, 9, 3]);
    is_eq!(tap, v.len(), 4, "extend appends every element");
    v.sort_unstable();
    is_eq!(tap, v, [3, 3, 5, 9], "sort orders ascending");
    v.dedup();
    is_eq!(tap, v, [3, 5, 9], "dedup drops adjacent duplicates");
    is_eq!(tap, v.pop(), Some(9), "pop returns the last element");
    is_none!(tap, v.get(7), "get past the end is None");
    ok!(tap, v.capacity() >= v.len(), "capacity covers length");
    eq_ptr!(tap, &v[0], v.as_ptr(), "first element sits at the buffer start");
}

fn strings(tap: &Tap) {
    let s = String::from("  hello, world  ");
    eq_str!(tap, s.trim(), "hello, world", "trim strips both ends");
    let parts: Vec<&str> = s.trim().split(", ").collect();
    is_eq!(tap, parts, ["hello", "world"], "split on a separator");
    eq_str!(
        tap,
        s.trim().replace("world", "tap"),
        "hello, tap",
        "replace substitutes the match"
    );
    ne_str!(tap, s.to_uppercase(), s, "uppercase differs");
    is_eq!(tap, "42".parse::<i32>(), Ok(42), "parse a decimal integer");
    ok!(tap, "x1".parse::<i32>().is_err(), "parse rejects non-digits");
}

fn maps(tap: &Tap) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in "a b a c a".split_whitespace() {
        *counts.entry(word).or_default() += 1;
    }
    is_eq!(tap, counts.len(), 3, "three distinct words");
    is_eq!(tap, counts.get("a"), Some(&3), "one count per occurrence");
    is_none!(tap, counts.get("z"), "absent key");
    let mut keys: Vec<&str> = counts.keys().copied().collect();
    keys.sort_unstable();
    is_eq!(tap, keys, ["a", "b", "c"], "keys sort lexically");
}

fn procfs(tap: &Tap) {
    let status = Path::new("/proc/self/status");
    tap.skip_if(!status.exists(), 1, "no procfs", || {
        let text = std::fs::read_to_string(status).unwrap_or_default();
        ok!(tap, text.contains("Pid:"), "procfs describes this process");
    });
}

fn crashes(tap: &Tap) {
    let mut v = vec![1, 2, 3];
    lives!(tap, v.push(4), "push never crashes");
    is_eq!(tap, v.len(), 4, "surviving block re-ran in this process");
    dies!(tap, std::hint::black_box(v[10]), "indexing past the end panics");
    dies!(
        tap,
        "not a number".parse::<u32>().unwrap(),
        "unwrap on an Err panics"
    );
    dies!(tap, std::process::abort(), "abort ends the child");
}
