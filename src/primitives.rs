use tracing::warn;

use crate::eval::Interp;
use crate::value::{Cell, CellId, NativeFn};

/// The builtin table. Each entry becomes a global binding holding a native
/// cell of the same name.
const NATIVES: &[(&str, NativeFn)] = &[
    ("+", native_add),
    ("-", native_sub),
    ("*", native_mul),
    ("/", native_div),
    ("=", native_num_eq),
    ("<", native_lt),
    (">", native_gt),
    ("cons", native_cons),
    ("car", native_car),
    ("cdr", native_cdr),
    ("begin", native_begin),
];

pub fn register_all(interp: &mut Interp) {
    for &(name, func) in NATIVES {
        let cell = interp.native(name, func);
        interp.define_global(name, cell);
    }
}

/// A numeric argument, kept exact until a real forces promotion.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Real(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Real(r) => r,
        }
    }
}

/// Pull the evaluated argument list apart into numbers. Any non-numeric
/// argument fails the whole call.
fn numeric_args(interp: &Interp, args: CellId, op: &str) -> Option<Vec<Num>> {
    let items = interp.list_to_vec(args)?;
    let mut nums = Vec::with_capacity(items.len());
    for item in items {
        match interp.arena().cell(item) {
            Cell::Int(n) => nums.push(Num::Int(*n)),
            Cell::Real(r) => nums.push(Num::Real(*r)),
            _ => {
                warn!(op, "native: non-numeric argument");
                return None;
            }
        }
    }
    Some(nums)
}

fn make_num(interp: &mut Interp, num: Num) -> CellId {
    match num {
        Num::Int(n) => interp.int(n),
        Num::Real(r) => interp.real(r),
    }
}

/// Fold with int/real promotion: the result stays an integer until any
/// operand is a real.
fn fold(init: Num, rest: &[Num], int_op: fn(i64, i64) -> i64, real_op: fn(f64, f64) -> f64) -> Num {
    rest.iter().fold(init, |acc, &n| match (acc, n) {
        (Num::Int(a), Num::Int(b)) => Num::Int(int_op(a, b)),
        (a, b) => Num::Real(real_op(a.as_f64(), b.as_f64())),
    })
}

fn native_add(interp: &mut Interp, args: CellId) -> CellId {
    let Some(nums) = numeric_args(interp, args, "+") else {
        return interp.nil();
    };
    let sum = fold(Num::Int(0), &nums, i64::wrapping_add, |a, b| a + b);
    make_num(interp, sum)
}

/// Subtraction; with a single argument it negates.
fn native_sub(interp: &mut Interp, args: CellId) -> CellId {
    let Some(nums) = numeric_args(interp, args, "-") else {
        return interp.nil();
    };
    match nums.as_slice() {
        [] => {
            warn!("native: - needs at least one argument");
            interp.nil()
        }
        [Num::Int(n)] => interp.int(n.wrapping_neg()),
        [Num::Real(r)] => interp.real(-r),
        [first, rest @ ..] => {
            let diff = fold(*first, rest, i64::wrapping_sub, |a, b| a - b);
            make_num(interp, diff)
        }
    }
}

fn native_mul(interp: &mut Interp, args: CellId) -> CellId {
    let Some(nums) = numeric_args(interp, args, "*") else {
        return interp.nil();
    };
    let product = fold(Num::Int(1), &nums, i64::wrapping_mul, |a, b| a * b);
    make_num(interp, product)
}

/// Division. Exact integer division stays an integer; an inexact quotient
/// promotes to a real. Division by zero fails the call.
fn native_div(interp: &mut Interp, args: CellId) -> CellId {
    let Some(nums) = numeric_args(interp, args, "/") else {
        return interp.nil();
    };
    let Some((first, rest)) = nums.split_first() else {
        warn!("native: / needs at least one argument");
        return interp.nil();
    };
    let mut acc = if rest.is_empty() {
        // Single argument: the reciprocal.
        if first.as_f64() == 0.0 {
            warn!("native: division by zero");
            return interp.nil();
        }
        Num::Real(1.0 / first.as_f64())
    } else {
        *first
    };
    for &divisor in rest {
        acc = match (acc, divisor) {
            (_, Num::Int(0)) => {
                warn!("native: division by zero");
                return interp.nil();
            }
            (Num::Int(a), Num::Int(b)) => match a.checked_rem(b) {
                Some(0) => Num::Int(a.wrapping_div(b)),
                Some(_) => Num::Real(a as f64 / b as f64),
                // i64::MIN / -1: the remainder is zero and the quotient
                // wraps, like the other integer operators.
                None => Num::Int(a.wrapping_div(b)),
            },
            (a, b) => {
                let b = b.as_f64();
                if b == 0.0 {
                    warn!("native: division by zero");
                    return interp.nil();
                }
                Num::Real(a.as_f64() / b)
            }
        };
    }
    make_num(interp, acc)
}

/// Chained pairwise comparison: true when every adjacent pair satisfies the
/// predicate. Integer pairs compare exactly; any real promotes the pair.
fn compare(
    interp: &mut Interp,
    args: CellId,
    op: &'static str,
    int_cmp: fn(i64, i64) -> bool,
    real_cmp: fn(f64, f64) -> bool,
) -> CellId {
    let Some(nums) = numeric_args(interp, args, op) else {
        return interp.nil();
    };
    if nums.len() < 2 {
        warn!(op, "native: comparison needs at least two arguments");
        return interp.nil();
    }
    let holds = nums.windows(2).all(|pair| match (pair[0], pair[1]) {
        (Num::Int(a), Num::Int(b)) => int_cmp(a, b),
        (a, b) => real_cmp(a.as_f64(), b.as_f64()),
    });
    interp.bool(holds)
}

fn native_num_eq(interp: &mut Interp, args: CellId) -> CellId {
    compare(interp, args, "=", |a, b| a == b, |a, b| a == b)
}

fn native_lt(interp: &mut Interp, args: CellId) -> CellId {
    compare(interp, args, "<", |a, b| a < b, |a, b| a < b)
}

fn native_gt(interp: &mut Interp, args: CellId) -> CellId {
    compare(interp, args, ">", |a, b| a > b, |a, b| a > b)
}

fn native_cons(interp: &mut Interp, args: CellId) -> CellId {
    let Some(items) = interp.list_to_vec(args) else {
        return interp.nil();
    };
    let [car, cdr] = items.as_slice() else {
        warn!("native: cons takes exactly two arguments");
        return interp.nil();
    };
    interp.cons(*car, *cdr)
}

fn native_car(interp: &mut Interp, args: CellId) -> CellId {
    interp.car(interp.car(args))
}

fn native_cdr(interp: &mut Interp, args: CellId) -> CellId {
    interp.cdr(interp.car(args))
}

/// Arguments arrive already evaluated, in order, so begin only has to hand
/// back the last one.
fn native_begin(interp: &mut Interp, args: CellId) -> CellId {
    let mut result = interp.nil();
    let mut current = args;
    while let Cell::Cons(car, cdr) = interp.arena().cell(current) {
        result = *car;
        current = *cdr;
    }
    result
}
