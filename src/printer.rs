use crate::eval::Interp;
use crate::value::{Cell, CellId};

/// Nesting depth past which rendering gives up. Deep enough for anything a
/// person will read, shallow enough that a cyclic structure terminates.
const MAX_DEPTH: usize = 1000;

/// Render a value to its canonical external form.
pub fn print(interp: &Interp, id: CellId) -> String {
    let mut out = String::new();
    print_inner(interp, id, 0, &mut out);
    out
}

fn print_inner(interp: &Interp, id: CellId, depth: usize, out: &mut String) {
    if depth > MAX_DEPTH {
        out.push_str("...");
        return;
    }
    // The singletons print by handle identity; their cells are all blank.
    if id == interp.nil() {
        out.push_str("()");
        return;
    }
    if id == interp.t() {
        out.push_str("#t");
        return;
    }
    if id == interp.f() {
        out.push_str("#f");
        return;
    }
    match interp.arena().cell(id) {
        Cell::None => out.push_str("()"),
        Cell::Int(n) => out.push_str(&n.to_string()),
        Cell::Real(r) => out.push_str(&format!("{:.6}", r)),
        Cell::Str(s) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
        Cell::Symbol(s) => out.push_str(s),
        Cell::Proc { .. } => out.push_str("<*CODE*>"),
        Cell::Native { name, .. } => {
            out.push('<');
            out.push_str(name);
            out.push('>');
        }
        Cell::Cons(car, cdr) => {
            let (mut car, mut cdr) = (*car, *cdr);
            // Depth advances along the spine too, so an overlong (or
            // cyclic) list hits the cap just like deep nesting does.
            let mut spine = depth;
            out.push('(');
            loop {
                print_inner(interp, car, spine + 1, out);
                if cdr == interp.nil() {
                    break;
                }
                spine += 1;
                match interp.arena().cell(cdr) {
                    Cell::Cons(next_car, next_cdr) => {
                        if spine > MAX_DEPTH {
                            out.push_str(" ...");
                            break;
                        }
                        out.push(' ');
                        car = *next_car;
                        cdr = *next_cdr;
                    }
                    _ => {
                        // Improper tail.
                        out.push_str(" . ");
                        print_inner(interp, cdr, spine + 1, out);
                        break;
                    }
                }
            }
            out.push(')');
        }
    }
}
