//! Polynomial helpers: Legendre evaluation, bracketing root search and
//! Lagrange bases.

/// Legendre polynomial `P_n(x)` by the three-term recurrence.
pub fn legendre(n: usize, x: f64) -> f64 {
    let (mut p_prev, mut p) = (1.0, x);
    if n == 0 {
        return p_prev;
    }
    for k in 1..n {
        let kf = k as f64;
        let next = ((2.0 * kf + 1.0) * x * p - kf * p_prev) / (kf + 1.0);
        p_prev = p;
        p = next;
    }
    p
}

/// Derivative `P'_n(x)` for `x` strictly inside `(-1, 1)`.
pub fn legendre_derivative(n: usize, x: f64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    n as f64 * (x * legendre(n, x) - legendre(n - 1, x)) / (x * x - 1.0)
}

/// Roots of `f` in the open interval `(a, b)`.
///
/// Scans `intervals` equal sub-intervals for sign changes (endpoints of the
/// scan are excluded) and refines each bracket by bisection to machine
/// precision. Roots closer together than one scan interval may be missed;
/// callers check the count.
pub fn find_roots(f: impl Fn(f64) -> f64, a: f64, b: f64, intervals: usize) -> Vec<f64> {
    let h = (b - a) / intervals as f64;
    let mut roots = Vec::new();
    let mut x_lo = a + h;
    let mut f_lo = f(x_lo);
    for i in 2..intervals {
        let x_hi = a + h * i as f64;
        let f_hi = f(x_hi);
        if f_lo == 0.0 {
            roots.push(x_lo);
        } else if f_lo * f_hi < 0.0 {
            roots.push(bisect(&f, x_lo, x_hi, f_lo));
        }
        x_lo = x_hi;
        f_lo = f_hi;
    }
    if f_lo == 0.0 {
        roots.push(x_lo);
    }
    roots
}

fn bisect(f: &impl Fn(f64) -> f64, mut lo: f64, mut hi: f64, mut f_lo: f64) -> f64 {
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        let f_mid = f(mid);
        if f_mid == 0.0 {
            return mid;
        }
        if f_lo * f_mid < 0.0 {
            hi = mid;
        } else {
            lo = mid;
            f_lo = f_mid;
        }
    }
    0.5 * (lo + hi)
}

/// The `j`-th Lagrange basis polynomial of `nodes` evaluated at `x`.
///
/// Evaluated as a product so that `lagrange_eval(nodes, j, nodes[i])` is
/// exactly `1.0` for `i == j` and exactly `0.0` otherwise.
pub fn lagrange_eval(nodes: &[f64], j: usize, x: f64) -> f64 {
    nodes
        .iter()
        .enumerate()
        .filter(|(k, _)| *k != j)
        .map(|(_, xk)| (x - xk) / (nodes[j] - xk))
        .product()
}

/// Monomial coefficients (constant term first) of the `j`-th Lagrange
/// basis polynomial of `nodes`.
pub fn lagrange_coefficients(nodes: &[f64], j: usize) -> Vec<f64> {
    let mut coeffs = vec![1.0];
    let mut denom = 1.0;
    for (k, xk) in nodes.iter().enumerate() {
        if k == j {
            continue;
        }
        // Multiply by (x - xk).
        let mut next = vec![0.0; coeffs.len() + 1];
        for (i, c) in coeffs.iter().enumerate() {
            next[i + 1] += c;
            next[i] -= c * xk;
        }
        coeffs = next;
        denom *= nodes[j] - xk;
    }
    coeffs.iter().map(|c| c / denom).collect()
}

/// `∫_a^b p(x) dx` for monomial coefficients `coeffs`.
pub fn integrate(coeffs: &[f64], a: f64, b: f64) -> f64 {
    let antiderivative = |x: f64| {
        coeffs
            .iter()
            .enumerate()
            .rev()
            .fold(0.0, |acc, (i, c)| acc * x + c / (i as f64 + 1.0))
            * x
    };
    antiderivative(b) - antiderivative(a)
}
