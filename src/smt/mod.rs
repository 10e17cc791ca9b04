// Copyright 2023 The Regents of the University of California
// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

mod parse;
mod serialize;

pub use parse::{parse_smt_bool, parse_smt_int, parse_smt_value};
pub use serialize::{convert_expr, convert_int, convert_sort, escape_smt_identifier};
