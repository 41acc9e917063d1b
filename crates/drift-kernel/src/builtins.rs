//! The approved `math.*` and `random.*` function sets.

use rand::Rng;

/// Deterministic math functions callable as `math.NAME(..)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MathFn {
    /// `sin(x)`
    Sin,
    /// `cos(x)`
    Cos,
    /// `tan(x)`
    Tan,
    /// `asin(x)`
    Asin,
    /// `acos(x)`
    Acos,
    /// `atan(x)`
    Atan,
    /// `atan2(y, x)`
    Atan2,
    /// `sinh(x)`
    Sinh,
    /// `cosh(x)`
    Cosh,
    /// `tanh(x)`
    Tanh,
    /// `sqrt(x)`
    Sqrt,
    /// `exp(x)`
    Exp,
    /// Natural log.
    Log,
    /// `log10(x)`
    Log10,
    /// `pow(x, y)`
    Pow,
    /// `abs(x)`
    Abs,
    /// `floor(x)`
    Floor,
    /// `ceil(x)`
    Ceil,
    /// `min(a, b)`
    Min,
    /// `max(a, b)`
    Max,
    /// `hypot(x, y)`
    Hypot,
}

impl MathFn {
    /// Every function, in listing order.
    pub const ALL: [MathFn; 21] = [
        Self::Sin,
        Self::Cos,
        Self::Tan,
        Self::Asin,
        Self::Acos,
        Self::Atan,
        Self::Atan2,
        Self::Sinh,
        Self::Cosh,
        Self::Tanh,
        Self::Sqrt,
        Self::Exp,
        Self::Log,
        Self::Log10,
        Self::Pow,
        Self::Abs,
        Self::Floor,
        Self::Ceil,
        Self::Min,
        Self::Max,
        Self::Hypot,
    ];

    /// Look up by kernel-visible name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Kernel-visible name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Asin => "asin",
            Self::Acos => "acos",
            Self::Atan => "atan",
            Self::Atan2 => "atan2",
            Self::Sinh => "sinh",
            Self::Cosh => "cosh",
            Self::Tanh => "tanh",
            Self::Sqrt => "sqrt",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Log10 => "log10",
            Self::Pow => "pow",
            Self::Abs => "abs",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Min => "min",
            Self::Max => "max",
            Self::Hypot => "hypot",
        }
    }

    /// Number of arguments.
    pub fn arity(self) -> usize {
        match self {
            Self::Atan2 | Self::Pow | Self::Min | Self::Max | Self::Hypot => 2,
            _ => 1,
        }
    }

    /// Evaluate. `args` holds exactly [`arity`](Self::arity) values.
    #[inline]
    pub fn eval(self, args: &[f64]) -> f64 {
        let a = args[0];
        let b = || args[1];
        match self {
            Self::Sin => a.sin(),
            Self::Cos => a.cos(),
            Self::Tan => a.tan(),
            Self::Asin => a.asin(),
            Self::Acos => a.acos(),
            Self::Atan => a.atan(),
            Self::Atan2 => a.atan2(b()),
            Self::Sinh => a.sinh(),
            Self::Cosh => a.cosh(),
            Self::Tanh => a.tanh(),
            Self::Sqrt => a.sqrt(),
            Self::Exp => a.exp(),
            Self::Log => a.ln(),
            Self::Log10 => a.log10(),
            Self::Pow => a.powf(b()),
            Self::Abs => a.abs(),
            Self::Floor => a.floor(),
            Self::Ceil => a.ceil(),
            Self::Min => a.min(b()),
            Self::Max => a.max(b()),
            Self::Hypot => a.hypot(b()),
        }
    }
}

/// Value of `math.pi` / `math.e`.
pub fn math_constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        _ => None,
    }
}

/// Seeded random functions callable as `random.NAME(..)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RandomFn {
    /// `random()`: uniform in `[0, 1)`.
    Random,
    /// `uniform(a, b)`
    Uniform,
    /// `normal(mean, sd)`
    Normal,
    /// `randint(a, b)`: integer in `[a, b]`.
    Randint,
    /// `expovariate(lambda)`
    Expovariate,
}

impl RandomFn {
    /// Every function, in listing order.
    pub const ALL: [RandomFn; 5] = [
        Self::Random,
        Self::Uniform,
        Self::Normal,
        Self::Randint,
        Self::Expovariate,
    ];

    /// Look up by kernel-visible name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Kernel-visible name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Uniform => "uniform",
            Self::Normal => "normal",
            Self::Randint => "randint",
            Self::Expovariate => "expovariate",
        }
    }

    /// Number of arguments.
    pub fn arity(self) -> usize {
        match self {
            Self::Random => 0,
            Self::Expovariate => 1,
            Self::Uniform | Self::Normal | Self::Randint => 2,
        }
    }

    /// Draw one value from `rng`.
    pub fn eval<R: Rng + ?Sized>(self, rng: &mut R, args: &[f64]) -> f64 {
        match self {
            Self::Random => rng.random::<f64>(),
            Self::Uniform => {
                let (a, b) = (args[0], args[1]);
                a + (b - a) * rng.random::<f64>()
            }
            Self::Normal => {
                // Box-Muller; 1 - u keeps the log argument in (0, 1].
                let u1 = 1.0 - rng.random::<f64>();
                let u2 = rng.random::<f64>();
                let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
                args[0] + args[1] * z
            }
            Self::Randint => {
                let (lo, hi) = (args[0].ceil(), args[1].floor());
                if hi < lo {
                    return f64::NAN;
                }
                let span = hi - lo + 1.0;
                (lo + (rng.random::<f64>() * span).floor()).min(hi)
            }
            Self::Expovariate => -(1.0 - rng.random::<f64>()).ln() / args[0],
        }
    }
}
