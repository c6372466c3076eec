//! Integer factoring helpers for the division and square-root rules.

/// Multiples above this magnitude are never factored.
pub const MAX_FACTORED: f64 = 1e9;

/// The absolute value of `value` when it is a factorable whole number.
pub fn as_whole(value: f64) -> Option<u64> {
    let magnitude = value.abs();
    if magnitude.fract() == 0.0 && magnitude >= 1.0 && magnitude <= MAX_FACTORED {
        Some(magnitude as u64)
    } else {
        None
    }
}

/// All divisors of `n`, ascending.
pub fn divisors(n: u64) -> Vec<u64> {
    if n == 0 {
        return Vec::new();
    }
    let mut low = Vec::new();
    let mut high = Vec::new();
    let mut i = 1u64;
    while i * i <= n {
        if n % i == 0 {
            low.push(i);
            if i * i != n {
                high.push(n / i);
            }
        }
        i += 1;
    }
    low.extend(high.into_iter().rev());
    low
}

pub fn greatest_common_factor(a: u64, b: u64) -> u64 {
    let (small, large) = if a <= b { (a, b) } else { (b, a) };
    if small == 0 {
        return large;
    }
    divisors(small)
        .into_iter()
        .rev()
        .find(|d| large % d == 0)
        .unwrap_or(1)
}

fn exact_sqrt(n: u64) -> Option<u64> {
    let root = (n as f64).sqrt().round() as u64;
    (root * root == n).then_some(root)
}

/// Largest `r` such that `r * r` divides `n`.
pub fn largest_square_root_factor(n: u64) -> u64 {
    divisors(n)
        .into_iter()
        .filter_map(exact_sqrt)
        .max()
        .unwrap_or(1)
}
