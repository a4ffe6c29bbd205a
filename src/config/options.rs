//! Runtime options for the Krylov and preconditioner contexts.
//!
//! Two layers: typed option structs with PETSc defaults ([`KspOptions`], [`PcOptions`]) and a
//! string-keyed [`OptionsDatabase`] parsed from `-key value` tokens, which contexts consult in
//! their `set_from_options` step.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::KError;

/// Environment variable read by [`OptionsDatabase::from_env`].
pub const OPTIONS_ENV: &str = "KRYLINK_OPTIONS";

/// Side on which the preconditioner is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PcSide {
    Left,
    #[default]
    Right,
}

impl FromStr for PcSide {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, ()> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(PcSide::Left),
            "right" => Ok(PcSide::Right),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PcSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PcSide::Left => "left",
            PcSide::Right => "right",
        })
    }
}

/// Krylov context parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct KspOptions {
    /// Relative decrease of the residual norm
    pub rtol: f64,
    /// Absolute residual norm
    pub atol: f64,
    /// Divergence factor relative to the initial residual
    pub dtol: f64,
    pub max_it: usize,
    /// GMRES restart length
    pub gmres_restart: usize,
    pub pc_side: PcSide,
    /// Damping for Richardson
    pub richardson_scale: f64,
    /// Eigenvalue bounds for Chebyshev; estimated when absent
    pub chebyshev_bounds: Option<(f64, f64)>,
    pub initial_guess_nonzero: bool,
}

impl Default for KspOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-5,
            atol: 1e-50,
            dtol: 1e5,
            max_it: 10_000,
            gmres_restart: 30,
            pc_side: PcSide::Right,
            richardson_scale: 1.0,
            chebyshev_bounds: None,
            initial_guess_nonzero: false,
        }
    }
}

/// Preconditioner parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct PcOptions {
    /// Relaxation factor ω for SOR and Eisenstat
    pub sor_omega: f64,
    /// Number of SOR sweeps per application
    pub sor_its: usize,
    /// Overlap layers for additive Schwarz
    pub asm_overlap: usize,
    /// Total number of block-Jacobi blocks (one when unset)
    pub total_blocks: Option<usize>,
}

impl Default for PcOptions {
    fn default() -> Self {
        Self {
            sor_omega: 1.0,
            sor_its: 1,
            asm_overlap: 1,
            total_blocks: None,
        }
    }
}

/// String-keyed runtime options, PETSc style.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptionsDatabase {
    entries: HashMap<String, Option<String>>,
}

impl OptionsDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `-key [value]` tokens. A token that does not start with `-` is the value of the
    /// preceding key; a key followed by another key is a flag. Negative numbers are values.
    pub fn parse<I, S>(args: I) -> Result<Self, KError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut db = Self::new();
        let mut pending: Option<String> = None;
        for tok in args {
            let tok = tok.as_ref();
            if let Some(key) = tok.strip_prefix('-').filter(|k| is_key(k)) {
                if let Some(prev) = pending.take() {
                    db.entries.insert(prev, None);
                }
                pending = Some(key.to_string());
            } else {
                match pending.take() {
                    Some(key) => {
                        db.entries.insert(key, Some(tok.to_string()));
                    }
                    None => {
                        return Err(KError::InvalidOption {
                            key: String::new(),
                            value: tok.to_string(),
                        });
                    }
                }
            }
        }
        if let Some(prev) = pending {
            db.entries.insert(prev, None);
        }
        Ok(db)
    }

    /// Read whitespace-separated options from `KRYLINK_OPTIONS`; empty when unset.
    pub fn from_env() -> Result<Self, KError> {
        match std::env::var(OPTIONS_ENV) {
            Ok(s) => Self::parse(s.split_whitespace()),
            Err(_) => Ok(Self::new()),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key.trim_start_matches('-').to_string(), Some(value.into()));
        self
    }

    pub fn set_flag(&mut self, key: &str) -> &mut Self {
        self.entries.insert(key.trim_start_matches('-').to_string(), None);
        self
    }

    pub fn has_flag(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|v| v.as_deref())
    }

    /// Typed lookup; `Ok(None)` when absent, `InvalidOption` when present but malformed.
    pub fn get_parsed<F: FromStr>(&self, key: &str) -> Result<Option<F>, KError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(None) => Err(invalid(key, "")),
            Some(Some(v)) => v.parse::<F>().map(Some).map_err(|_| invalid(key, v)),
        }
    }

    /// Boolean option: a bare flag means true, otherwise `true|false|1|0`.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, KError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(None) => Ok(Some(true)),
            Some(Some(v)) => match v.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Some(true)),
                "false" | "0" | "no" => Ok(Some(false)),
                _ => Err(invalid(key, v)),
            },
        }
    }

    /// A `lo,hi` pair of reals.
    pub fn get_pair(&self, key: &str) -> Result<Option<(f64, f64)>, KError> {
        let Some(raw) = self.get_str(key) else {
            return if self.has_flag(key) { Err(invalid(key, "")) } else { Ok(None) };
        };
        let mut it = raw.split(',').map(|s| s.trim().parse::<f64>());
        match (it.next(), it.next(), it.next()) {
            (Some(Ok(lo)), Some(Ok(hi)), None) => Ok(Some((lo, hi))),
            _ => Err(invalid(key, raw)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overlay typed Krylov options.
    pub fn apply_ksp(&self, opts: &mut KspOptions) -> Result<(), KError> {
        if let Some(v) = self.get_parsed("ksp_rtol")? {
            opts.rtol = v;
        }
        if let Some(v) = self.get_parsed("ksp_atol")? {
            opts.atol = v;
        }
        if let Some(v) = self.get_parsed("ksp_divtol")? {
            opts.dtol = v;
        }
        if let Some(v) = self.get_parsed("ksp_max_it")? {
            opts.max_it = v;
        }
        if let Some(v) = self.get_parsed::<usize>("ksp_gmres_restart")? {
            if v == 0 {
                return Err(invalid("ksp_gmres_restart", "0"));
            }
            opts.gmres_restart = v;
        }
        if let Some(v) = self.get_parsed("ksp_pc_side")? {
            opts.pc_side = v;
        }
        if let Some(v) = self.get_parsed("ksp_richardson_scale")? {
            opts.richardson_scale = v;
        }
        if let Some(v) = self.get_pair("ksp_chebyshev_eigenvalues")? {
            opts.chebyshev_bounds = Some(v);
        }
        if let Some(v) = self.get_bool("ksp_initial_guess_nonzero")? {
            opts.initial_guess_nonzero = v;
        }
        Ok(())
    }

    /// Overlay typed preconditioner options.
    pub fn apply_pc(&self, opts: &mut PcOptions) -> Result<(), KError> {
        if let Some(v) = self.get_parsed("pc_sor_omega")? {
            opts.sor_omega = v;
        }
        if let Some(v) = self.get_parsed("pc_sor_its")? {
            opts.sor_its = v;
        }
        if let Some(v) = self.get_parsed("pc_asm_overlap")? {
            opts.asm_overlap = v;
        }
        if let Some(v) = self.get_parsed::<usize>("pc_bjacobi_blocks")? {
            if v == 0 {
                return Err(invalid("pc_bjacobi_blocks", "0"));
            }
            opts.total_blocks = Some(v);
        }
        Ok(())
    }
}

fn is_key(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
}

fn invalid(key: &str, value: &str) -> KError {
    KError::InvalidOption {
        key: key.to_string(),
        value: value.to_string(),
    }
}
