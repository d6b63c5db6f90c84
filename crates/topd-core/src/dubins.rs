//! Shortest curvature-constrained paths between oriented poses.
//!
//! A Dubins path is one of six circle/straight words (LSL, LSR, RSL, RSR,
//! RLR, LRL); the shortest feasible word gives the edge length between two
//! heading-discretized vertices. All arc lengths are computed in the unit
//! circle frame and scaled back by the turn radius at the end.

use std::f64::consts::PI;

/// An oriented pose: position plus heading in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Pose { x, y, heading }
    }
}

/// The six Dubins words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Word {
    Lsl,
    Lsr,
    Rsl,
    Rsr,
    Rlr,
    Lrl,
}

pub const ALL_WORDS: [Word; 6] = [Word::Lsl, Word::Lsr, Word::Rsl, Word::Rsr, Word::Rlr, Word::Lrl];

/// A solved path: word, the three normalized segment lengths, and the turn
/// radius they were solved for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DubinsPath {
    pub word: Word,
    pub segments: [f64; 3],
    pub radius: f64,
}

impl DubinsPath {
    pub fn length(&self) -> f64 {
        (self.segments[0] + self.segments[1] + self.segments[2]) * self.radius
    }
}

fn mod2pi(theta: f64) -> f64 {
    theta.rem_euclid(2.0 * PI)
}

/// Normalized inputs shared by all six word solvers.
struct Frame {
    d: f64,
    sa: f64,
    sb: f64,
    ca: f64,
    cb: f64,
    c_ab: f64,
}

impl Frame {
    fn new(from: Pose, to: Pose, radius: f64) -> (Frame, f64, f64) {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let d = (dx * dx + dy * dy).sqrt() / radius;
        let theta = if d > 0.0 { mod2pi(dy.atan2(dx)) } else { 0.0 };
        let alpha = mod2pi(from.heading - theta);
        let beta = mod2pi(to.heading - theta);
        let frame = Frame {
            d,
            sa: alpha.sin(),
            sb: beta.sin(),
            ca: alpha.cos(),
            cb: beta.cos(),
            c_ab: (alpha - beta).cos(),
        };
        (frame, alpha, beta)
    }
}

fn lsl(f: &Frame, alpha: f64, beta: f64) -> Option<[f64; 3]> {
    let tmp0 = f.d + f.sa - f.sb;
    let p_sq = 2.0 + f.d * f.d - 2.0 * f.c_ab + 2.0 * f.d * (f.sa - f.sb);
    if p_sq < 0.0 {
        return None;
    }
    let tmp1 = (f.cb - f.ca).atan2(tmp0);
    Some([mod2pi(tmp1 - alpha), p_sq.sqrt(), mod2pi(beta - tmp1)])
}

fn rsr(f: &Frame, alpha: f64, beta: f64) -> Option<[f64; 3]> {
    let tmp0 = f.d - f.sa + f.sb;
    let p_sq = 2.0 + f.d * f.d - 2.0 * f.c_ab + 2.0 * f.d * (f.sb - f.sa);
    if p_sq < 0.0 {
        return None;
    }
    let tmp1 = (f.ca - f.cb).atan2(tmp0);
    Some([mod2pi(alpha - tmp1), p_sq.sqrt(), mod2pi(tmp1 - beta)])
}

fn lsr(f: &Frame, alpha: f64, beta: f64) -> Option<[f64; 3]> {
    let p_sq = -2.0 + f.d * f.d + 2.0 * f.c_ab + 2.0 * f.d * (f.sa + f.sb);
    if p_sq < 0.0 {
        return None;
    }
    let p = p_sq.sqrt();
    let tmp = (-f.ca - f.cb).atan2(f.d + f.sa + f.sb) - (-2.0f64).atan2(p);
    Some([mod2pi(tmp - alpha), p, mod2pi(tmp - mod2pi(beta))])
}

fn rsl(f: &Frame, alpha: f64, beta: f64) -> Option<[f64; 3]> {
    let p_sq = -2.0 + f.d * f.d + 2.0 * f.c_ab - 2.0 * f.d * (f.sa + f.sb);
    if p_sq < 0.0 {
        return None;
    }
    let p = p_sq.sqrt();
    let tmp = (f.ca + f.cb).atan2(f.d - f.sa - f.sb) - 2.0f64.atan2(p);
    Some([mod2pi(alpha - tmp), p, mod2pi(mod2pi(beta) - tmp)])
}

fn rlr(f: &Frame, alpha: f64, beta: f64) -> Option<[f64; 3]> {
    let tmp0 = (6.0 - f.d * f.d + 2.0 * f.c_ab + 2.0 * f.d * (f.sa - f.sb)) / 8.0;
    if tmp0.abs() > 1.0 {
        return None;
    }
    let phi = (f.ca - f.cb).atan2(f.d - f.sa + f.sb);
    let p = mod2pi(2.0 * PI - tmp0.acos());
    let t = mod2pi(alpha - phi + mod2pi(p / 2.0));
    Some([t, p, mod2pi(alpha - beta - t + mod2pi(p))])
}

fn lrl(f: &Frame, alpha: f64, beta: f64) -> Option<[f64; 3]> {
    let tmp0 = (6.0 - f.d * f.d + 2.0 * f.c_ab + 2.0 * f.d * (f.sb - f.sa)) / 8.0;
    if tmp0.abs() > 1.0 {
        return None;
    }
    let phi = (f.ca - f.cb).atan2(f.d + f.sa - f.sb);
    let p = mod2pi(2.0 * PI - tmp0.acos());
    let t = mod2pi(phi - alpha + mod2pi(p / 2.0));
    Some([t, p, mod2pi(mod2pi(beta) - alpha - t + mod2pi(p))])
}

fn solve_word(word: Word, f: &Frame, alpha: f64, beta: f64) -> Option<[f64; 3]> {
    match word {
        Word::Lsl => lsl(f, alpha, beta),
        Word::Lsr => lsr(f, alpha, beta),
        Word::Rsl => rsl(f, alpha, beta),
        Word::Rsr => rsr(f, alpha, beta),
        Word::Rlr => rlr(f, alpha, beta),
        Word::Lrl => lrl(f, alpha, beta),
    }
}

/// Shortest path for one specific word, if that word is feasible.
pub fn specific_path(from: Pose, to: Pose, radius: f64, word: Word) -> Option<DubinsPath> {
    let (frame, alpha, beta) = Frame::new(from, to, radius);
    solve_word(word, &frame, alpha, beta).map(|segments| DubinsPath {
        word,
        segments,
        radius,
    })
}

/// Shortest path over all six words. `radius` must be positive; at least
/// one word is always feasible.
pub fn shortest_path(from: Pose, to: Pose, radius: f64) -> DubinsPath {
    let (frame, alpha, beta) = Frame::new(from, to, radius);
    let mut best: Option<DubinsPath> = None;
    for word in ALL_WORDS {
        if let Some(segments) = solve_word(word, &frame, alpha, beta) {
            let candidate = DubinsPath {
                word,
                segments,
                radius,
            };
            if best.map_or(true, |b| candidate.length() < b.length()) {
                best = Some(candidate);
            }
        }
    }
    // LSL/RSR are defined for every input, so `best` is always set.
    best.unwrap_or(DubinsPath {
        word: Word::Lsl,
        segments: [0.0, frame.d, 0.0],
        radius,
    })
}

pub fn euclidean(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    let dx = bx - ax;
    let dy = by - ay;
    (dx * dx + dy * dy).sqrt()
}
