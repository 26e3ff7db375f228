//! Module loading for `require`, `import` declarations and `import()`.
//!
//! Files are evaluated once, CommonJS style, with `module`, `exports`,
//! `require`, `__filename` and `__dirname` in scope, and cached by resolved
//! path until `unrequire` or a workspace clear. `path` and `fs` are built in.

use crate::builtins::{arg, native, to_text, undefined, Builtin};
use crate::interp::Host;
use crate::value::Saved;
use indexmap::IndexMap;
use rquickjs::context::EvalOptions;
use rquickjs::{Ctx, Exception, Function, Object, Persistent, Value as JsValue};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

const BUILTIN_MODULES: [&str; 2] = ["path", "fs"];

const PATH_FUNCTIONS: [(&str, Builtin); 5] = [
    ("join", path_join),
    ("basename", path_basename),
    ("dirname", path_dirname),
    ("extname", path_extname),
    ("resolve", path_resolve),
];

const FS_FUNCTIONS: [(&str, Builtin); 4] = [
    ("readFileSync", fs_read_file),
    ("writeFileSync", fs_write_file),
    ("existsSync", fs_exists),
    ("readdirSync", fs_readdir),
];

/// Loaded modules' exports by resolved path (or builtin name).
#[derive(Default)]
pub struct ModuleCache {
    modules: IndexMap<String, Saved>,
}

impl ModuleCache {
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn clear(&mut self) {
        self.modules.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    fn get(&self, key: &str) -> Option<Saved> {
        self.modules.get(key).cloned()
    }
}

impl std::fmt::Debug for ModuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

impl Host {
    /// First existing file for `spec` relative to the current directory,
    /// then each include directory. A missing `.js` extension is tried too.
    pub(crate) fn resolve_module(&self, spec: &str) -> Option<PathBuf> {
        let spec_path = Path::new(spec);
        let bases: Vec<PathBuf> = if spec_path.is_absolute() {
            vec![PathBuf::new()]
        } else {
            let options = self.options.borrow();
            std::iter::once(options.cwd.clone())
                .chain(options.include_dirs.iter().cloned())
                .collect()
        };
        for base in bases {
            let candidate = base.join(spec_path);
            if candidate.is_file() {
                return Some(canonical(candidate));
            }
            if candidate.extension().is_none() {
                let with_ext = candidate.with_extension("js");
                if with_ext.is_file() {
                    return Some(canonical(with_ext));
                }
            }
        }
        None
    }

    /// `require(spec)`: the module's `module.exports`.
    pub(crate) fn require<'js>(self: &Rc<Self>, ctx: &Ctx<'js>, spec: &str) -> rquickjs::Result<JsValue<'js>> {
        if BUILTIN_MODULES.contains(&spec) {
            let cached = self.modules.borrow().get(spec);
            if let Some(module) = cached {
                return module.restore(ctx);
            }
            let module = self.builtin_module(ctx, spec)?.into_value();
            self.cache_module(ctx, spec, &module);
            return Ok(module);
        }
        let Some(path) = self.resolve_module(spec) else {
            return Err(Exception::throw_message(ctx, &format!("Cannot find module '{spec}'")));
        };
        let key = path.display().to_string();
        let cached = self.modules.borrow().get(&key);
        if let Some(module) = cached {
            return module.restore(ctx);
        }
        let code = std::fs::read_to_string(&path).map_err(|e| {
            Exception::throw_message(ctx, &format!("Cannot read module '{key}': {e}"))
        })?;

        let exports = Object::new(ctx.clone())?;
        let module = Object::new(ctx.clone())?;
        module.set("exports", exports.clone())?;
        // Cached before running so circular requires see partial exports.
        self.cache_module(ctx, &key, &exports.clone().into_value());

        let dir = path
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let require = native(ctx, self, "require", require)?;
        let mut options = EvalOptions::default();
        options.strict = false;
        options.filename = Some(key.clone());
        // Same first line as the file, so positions in frames stay right.
        let wrapped = format!("(function (exports, require, module, __filename, __dirname) {{{code}\n}})");

        debug!(path = %key, "loading module");
        let loaded = ctx
            .eval_with_options::<Function, _>(wrapped, options)
            .and_then(|f| f.call::<_, ()>((exports, require, module.clone(), key.as_str(), dir)));
        if let Err(e) = loaded {
            self.modules.borrow_mut().modules.shift_remove(&key);
            return Err(e);
        }
        let exports: JsValue = module.get("exports")?;
        self.cache_module(ctx, &key, &exports);
        Ok(exports)
    }

    fn cache_module<'js>(&self, ctx: &Ctx<'js>, key: &str, exports: &JsValue<'js>) {
        self.modules
            .borrow_mut()
            .modules
            .insert(key.to_string(), Persistent::save(ctx, exports.clone()));
        self.ledger.borrow_mut().mark_changed();
    }

    /// Namespace object for `import`: the exports' own enumerable
    /// properties plus `default` bound to the exports themselves.
    pub(crate) fn import_namespace<'js>(self: &Rc<Self>, ctx: &Ctx<'js>, spec: &str) -> rquickjs::Result<JsValue<'js>> {
        let exports = self.require(ctx, spec)?;
        let namespace = Object::new(ctx.clone())?;
        if let Some(obj) = exports.as_object() {
            for entry in obj.props::<String, JsValue>() {
                let (key, value) = entry?;
                namespace.set(key, value)?;
            }
        }
        if !namespace.contains_key("default")? {
            namespace.set("default", exports)?;
        }
        Ok(namespace.into_value())
    }

    /// Drop `spec` from the cache so the next `require` reloads it.
    pub(crate) fn unrequire(&self, spec: &str) -> bool {
        let key = match self.resolve_module(spec) {
            Some(path) => path.display().to_string(),
            None => spec.to_string(),
        };
        let removed = self.modules.borrow_mut().modules.shift_remove(&key).is_some();
        if removed {
            self.ledger.borrow_mut().mark_changed();
        }
        removed
    }

    fn builtin_module<'js>(self: &Rc<Self>, ctx: &Ctx<'js>, name: &str) -> rquickjs::Result<Object<'js>> {
        let functions: &[(&str, Builtin)] = match name {
            "path" => &PATH_FUNCTIONS,
            _ => &FS_FUNCTIONS,
        };
        let module = Object::new(ctx.clone())?;
        for &(name, f) in functions {
            module.set(name, native(ctx, self, name, f)?)?;
        }
        Ok(module)
    }

    pub(crate) fn install_module_functions<'js>(self: &Rc<Self>, ctx: &Ctx<'js>) -> rquickjs::Result<()> {
        let require = native(ctx, self, "require", require)?;
        self.register_capability(ctx, "require", require, true)?;
        let unrequire = native(ctx, self, "unrequire", unrequire)?;
        self.register_capability(ctx, "unrequire", unrequire, false)
    }
}

fn canonical(path: PathBuf) -> PathBuf {
    std::fs::canonicalize(&path).unwrap_or(path)
}

fn require<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let spec = to_text(&arg(ctx, &args, 0))?;
    host.require(ctx, &spec)
}

fn unrequire<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let spec = to_text(&arg(ctx, &args, 0))?;
    Ok(JsValue::new_bool(ctx.clone(), host.unrequire(&spec)))
}

fn text<'js>(ctx: &Ctx<'js>, s: &str) -> rquickjs::Result<JsValue<'js>> {
    Ok(rquickjs::String::from_str(ctx.clone(), s)?.into_value())
}

/// Argument 0 as a path string.
fn path_arg<'js>(ctx: &Ctx<'js>, args: &[JsValue<'js>]) -> rquickjs::Result<String> {
    to_text(&arg(ctx, args, 0))
}

fn io_error(ctx: &Ctx<'_>, path: &str, error: std::io::Error) -> rquickjs::Error {
    Exception::throw_message(ctx, &format!("{path}: {error}"))
}

// ── path ────────────────────────────────────────────────────────────────

fn path_join<'js>(_host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let mut path = PathBuf::new();
    for a in &args {
        path.push(to_text(a)?);
    }
    text(ctx, &path.display().to_string())
}

fn path_basename<'js>(_host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let p = path_arg(ctx, &args)?;
    let base = Path::new(&p)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    text(ctx, &base)
}

fn path_dirname<'js>(_host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let p = path_arg(ctx, &args)?;
    let dir = Path::new(&p)
        .parent()
        .map(|s| s.display().to_string())
        .unwrap_or_else(|| ".".into());
    text(ctx, &dir)
}

fn path_extname<'js>(_host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let p = path_arg(ctx, &args)?;
    let ext = Path::new(&p)
        .extension()
        .map(|s| format!(".{}", s.to_string_lossy()))
        .unwrap_or_default();
    text(ctx, &ext)
}

fn path_resolve<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let mut path = host.options.borrow().cwd.clone();
    for a in &args {
        path.push(to_text(a)?);
    }
    text(ctx, &path.display().to_string())
}

// ── fs ──────────────────────────────────────────────────────────────────

fn fs_read_file<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let p = path_arg(ctx, &args)?;
    let path = host.options.borrow().cwd.join(&p);
    let contents = std::fs::read_to_string(&path).map_err(|e| io_error(ctx, &p, e))?;
    text(ctx, &contents)
}

fn fs_write_file<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let p = path_arg(ctx, &args)?;
    let data = to_text(&arg(ctx, &args, 1))?;
    let path = host.options.borrow().cwd.join(&p);
    std::fs::write(&path, data).map_err(|e| io_error(ctx, &p, e))?;
    Ok(undefined(ctx))
}

fn fs_exists<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let p = path_arg(ctx, &args)?;
    let exists = host.options.borrow().cwd.join(p).exists();
    Ok(JsValue::new_bool(ctx.clone(), exists))
}

fn fs_readdir<'js>(host: &Rc<Host>, ctx: &Ctx<'js>, args: Vec<JsValue<'js>>) -> rquickjs::Result<JsValue<'js>> {
    let p = path_arg(ctx, &args)?;
    let dir = host.options.borrow().cwd.join(&p);
    let entries = std::fs::read_dir(dir).map_err(|e| io_error(ctx, &p, e))?;
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    let list = rquickjs::Array::new(ctx.clone())?;
    for (i, name) in names.into_iter().enumerate() {
        list.set(i, name)?;
    }
    Ok(list.into_value())
}

#[cfg(test)]
mod tests {
    use crate::interp::{Interp, InterpOptions};
    use crate::value::Value;
    use std::path::Path;

    fn interp_in(dir: &Path) -> Interp {
        Interp::new(InterpOptions {
            cwd: dir.to_path_buf(),
            ..InterpOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn test_require_file_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("counter.js"), "var n = 0; exports.next = () => ++n;").unwrap();
        let mut interp = interp_in(dir.path());
        let a = interp.require("counter").unwrap();
        let b = interp.require("./counter.js").unwrap();
        assert_eq!(a, b);
        assert_eq!(interp.stats().required_modules, 1);
        assert!(interp.unrequire("counter.js"));
        assert_eq!(interp.stats().required_modules, 0);
    }

    #[test]
    fn test_include_dirs_are_searched() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("lib");
        std::fs::create_dir(&lib).unwrap();
        std::fs::write(lib.join("util.js"), "module.exports = 42;").unwrap();
        let mut interp = interp_in(dir.path());
        interp.options_mut().include_dirs.push(lib);
        let v = interp.require("util").unwrap();
        assert_eq!(v, Value::Number(42.0));
    }

    #[test]
    fn test_missing_module_throws() {
        let dir = tempfile::tempdir().unwrap();
        let mut interp = interp_in(dir.path());
        let err = interp.require("nope").unwrap_err();
        assert_eq!(err.to_string(), "Error: Cannot find module 'nope'");
    }

    #[test]
    fn test_builtin_path_module() {
        let dir = tempfile::tempdir().unwrap();
        let mut interp = interp_in(dir.path());
        let v = interp
            .evaluate("require('path').basename('/a/b/c.txt')", "test")
            .unwrap();
        assert_eq!(v, Value::string("c.txt"));
    }

    #[test]
    fn test_module_error_points_into_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.js"), "\n\nmissingName;\n").unwrap();
        let mut interp = interp_in(dir.path());
        let err = interp.require("broken").unwrap_err();
        let thrown = match err {
            crate::EvalError::Uncaught(t) => t,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(thrown.summary(), "ReferenceError: missingName is not defined");
        let stack = thrown.stack.unwrap_or_default();
        assert!(stack.contains("broken.js:3:"), "{stack}");
    }

    #[test]
    fn test_import_namespace_has_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("m.js"), "exports.a = 1;").unwrap();
        let mut interp = interp_in(dir.path());
        let v = interp
            .evaluate("jsl.import('m').then((ns) => ns.a + ns.default.a)", "test")
            .unwrap();
        assert_eq!(v, Value::Number(2.0));
        let err = interp.evaluate("jsl.import('absent')", "test").unwrap_err();
        assert!(err.to_string().contains("Cannot find module 'absent'"));
    }
}
