//! Target languages and their backend pairs.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::grammar::{Grammar, PyGrammar, RGrammar, ShGrammar};
use crate::mogrifier::{Mogrifier, PyMogrifier, RMogrifier, ShMogrifier};

/// A language with a grammar/mogrifier pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lang {
    Sh,
    Py,
    R,
}

impl Lang {
    pub const ALL: [Lang; 3] = [Lang::Sh, Lang::Py, Lang::R];

    /// Name as used in the IR and in pool file names.
    pub fn name(&self) -> &'static str {
        match self {
            Lang::Sh => "sh",
            Lang::Py => "py",
            Lang::R => "R",
        }
    }

    /// Interpreter named in the pool's shebang line.
    pub fn interpreter(&self) -> &'static str {
        match self {
            Lang::Sh => "bash",
            Lang::Py => "python3",
            Lang::R => "Rscript",
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Lang {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Lang::ALL
            .into_iter()
            .find(|lang| lang.name() == s)
            .ok_or_else(|| Error::UnsupportedLanguage(s.to_string()))
    }
}

/// The grammar and mogrifier that together render one pool.
pub struct Backend {
    pub lang: Lang,
    pub grammar: Box<dyn Grammar>,
    pub mogrifier: Box<dyn Mogrifier>,
}

/// Look up the backend for a language named in the IR.
///
/// # Errors
/// Returns [`Error::UnsupportedLanguage`] if no backend exists.
pub fn backend_for(lang: &str) -> Result<Backend> {
    let lang: Lang = lang.parse()?;
    let (grammar, mogrifier): (Box<dyn Grammar>, Box<dyn Mogrifier>) = match lang {
        Lang::Sh => (Box::new(ShGrammar), Box::new(ShMogrifier)),
        Lang::Py => (Box::new(PyGrammar), Box::new(PyMogrifier)),
        Lang::R => (Box::new(RGrammar), Box::new(RMogrifier)),
    };
    Ok(Backend {
        lang,
        grammar,
        mogrifier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lang_names() {
        for lang in Lang::ALL {
            assert_eq!(lang.name().parse::<Lang>().unwrap(), lang);
        }
        assert!(matches!(
            "r".parse::<Lang>().unwrap_err(),
            Error::UnsupportedLanguage(_)
        ));
    }

    #[test]
    fn test_backend_pairs_agree() {
        for lang in Lang::ALL {
            let backend = backend_for(lang.name()).unwrap();
            assert_eq!(backend.grammar.lang(), lang);
            assert_eq!(backend.mogrifier.lang(), lang);
        }
        assert!(backend_for("haskell").is_err());
    }
}
