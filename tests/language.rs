//! End-to-end language behaviour through the public API

use pretty_assertions::assert_eq;
use scuro::frontend::lexer::Lexer;
use scuro::frontend::token::TokenKind;
use scuro::{parse_source, Error, Interpreter, InterpreterOptions, OutputBuffer};

/// Run `source`, returning its results rendered with `tostring` and the
/// captured `print` output
fn run(source: &str) -> (Vec<String>, String) {
    let buffer = OutputBuffer::new();
    let mut interpreter = Interpreter::new().with_output(buffer.clone());
    let values = interpreter
        .run(source)
        .unwrap_or_else(|err| panic!("{}", err.render("test.lua")));
    let rendered = values.iter().map(|v| v.to_string()).collect();
    (rendered, buffer.contents())
}

fn eval(source: &str) -> Vec<String> {
    run(source).0
}

fn output(source: &str) -> String {
    run(source).1
}

fn run_err(source: &str) -> Error {
    let mut interpreter = Interpreter::with_options(InterpreterOptions {
        file_name: "test.lua".to_string(),
        ..InterpreterOptions::default()
    })
    .with_output(OutputBuffer::new());
    interpreter.run(source).unwrap_err()
}

fn token_kinds(source: &str) -> Vec<TokenKind> {
    Lexer::new(source)
        .tokenize()
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

// ==================== Lexing and parsing ====================

#[test]
fn retokenizing_full_text_yields_same_kinds() {
    let source = "#!/usr/bin/env scuro\n-- header\nlocal t = { 1, 0x1p4, [[long]] } --[==[ block ]==]\nprint(t[1] .. 'x\\n')\n";
    let tokens = Lexer::new(source).tokenize().unwrap();
    let rebuilt: String = tokens.iter().map(|t| t.full_text()).collect();
    assert_eq!(rebuilt, source);
    assert_eq!(token_kinds(&rebuilt), token_kinds(source));
}

#[test]
fn parsing_is_deterministic() {
    let source = "local a, b = f(1, ...) a.b:c'x'{y = 2}[3] = not -#z ^ 2";
    let wrapped = format!("function g(...) {} end", source);
    let first = parse_source(&wrapped, "a.lua").unwrap();
    let second = parse_source(&wrapped, "a.lua").unwrap();
    assert_eq!(first, second);
}

#[test]
fn unterminated_long_bracket_reports_eof() {
    let err = run_err("x = 1\n--[==[ never closed ]=]");
    assert!(matches!(err, Error::Lex { .. }));
    assert_eq!(err.to_string(), "expected `]==]` near <eof>");
}

#[test]
fn parse_error_is_rendered_with_position() {
    let err = run_err("local x = 1\nif x then\n  print(x)\n");
    assert_eq!(err.render("test.lua"), "test.lua:4:1: `end` expected near <eof>\n");
}

// ==================== Operators ====================

#[test]
fn precedence_and_associativity() {
    assert_eq!(eval("return 1 + 2 * 3, 2 ^ 2 ^ 3, -2 ^ 2, 7 % 3, -7 % 3"), vec!["7", "256", "-4", "1", "2"]);
    assert_eq!(eval("return 'a' .. 'b' .. 'c', 1 < 2 and 2 < 3, not nil == true"), vec!["abc", "true", "true"]);
}

#[test]
fn and_or_return_operands() {
    assert_eq!(eval("return nil or 'x', false and 1, 0 and 'zero', nil and nil"), vec!["x", "false", "zero", "nil"]);
}

#[test]
fn equality_uses_address_identity() {
    assert_eq!(
        eval("local a, b = {}, {} return a == b, a == a, 'hi' == 'h' .. 'i', 1 == 1.0, a ~= b"),
        vec!["false", "true", "true", "true", "true"]
    );
}

#[test]
fn concatenation_does_not_coerce_numbers() {
    let err = run_err("return 'n' .. 1");
    assert_eq!(err.to_string(), "attempt to concatenate a string with a number");
}

#[test]
fn relational_metamethods() {
    assert_eq!(
        eval(
            "local mt = {__lt = function(a, b) return a.v < b.v end,
                         __le = function(a, b) return a.v <= b.v end}
             local x = setmetatable({v = 1}, mt)
             local y = setmetatable({v = 2}, mt)
             return x < y, x > y, x <= y, y >= x"
        ),
        vec!["true", "false", "true", "true"]
    );
    assert_eq!(run_err("return {} < 1").to_string(), "attempt to compare table with number");
}

#[test]
fn arithmetic_metamethods() {
    assert_eq!(
        eval(
            "local V = {}
             V.__add = function(a, b) return setmetatable({x = a.x + b.x}, V) end
             V.__unm = function(a) return setmetatable({x = -a.x}, V) end
             V.__tostring = function(a) return 'V(' .. tostring(a.x) .. ')' end
             local v = setmetatable({x = 2}, V) + setmetatable({x = 3}, V)
             return tostring(v), tostring(-v)"
        ),
        vec!["V(5)", "V(-5)"]
    );
    assert_eq!(
        run_err("local t = {}\nreturn t + 1").render("x"),
        "test.lua:2:8: attempt to perform arithmetic on a table value\n"
    );
}

// ==================== Tables ====================

#[test]
fn array_part_grows_contiguously() {
    assert_eq!(
        eval("local t = {} t[1] = 'a' t[2] = 'b' local n = #t t[3] = 'c' return n, #t"),
        vec!["2", "3"]
    );
    assert_eq!(eval("local t = {} t[2] = 'b' local n = #t t[1] = 'a' return n, #t"), vec!["0", "2"]);
}

#[test]
fn index_metamethod_function_and_chain() {
    assert_eq!(
        eval(
            "local t = {}
             local mt = {}
             mt.__index = function(_, k) return k end
             setmetatable(t, mt)
             return t.anything"
        ),
        vec!["anything"]
    );
    assert_eq!(
        eval(
            "local base = {greet = function(self) return 'hi ' .. self.name end}
             local Derived = setmetatable({}, {__index = base})
             local obj = setmetatable({name = 'bo'}, {__index = Derived})
             return obj:greet()"
        ),
        vec!["hi bo"]
    );
}

#[test]
fn newindex_metamethod() {
    assert_eq!(
        eval(
            "local log = {}
             local t = setmetatable({}, {__newindex = function(t, k, v) rawset(t, k, v * 2) log[#log + 1] = k end})
             t.a = 1
             t.a = 5
             return t.a, #log"
        ),
        vec!["5", "1"]
    );
}

#[test]
fn pairs_visits_array_then_insertion_order() {
    assert_eq!(
        output(
            "local t = {10, 20, z = 1, a = 2}
             t.m = 3
             for k, v in pairs(t) do print(k, v) end"
        ),
        "1 10\n2 20\nz 1\na 2\nm 3\n"
    );
}

#[test]
fn clearing_fields_while_iterating() {
    assert_eq!(
        eval(
            "local t = {a = 1, b = 2, c = 3, 4, 5}
             local seen = 0
             for k in pairs(t) do t[k] = nil seen = seen + 1 end
             return seen, next(t)"
        ),
        vec!["5", "nil"]
    );
}

#[test]
fn nil_and_nan_keys_are_rejected() {
    assert_eq!(run_err("local t = {} t[nil] = 1").to_string(), "table index is nil");
    assert_eq!(run_err("local t = {} t[0/0] = 1").to_string(), "table index is NaN");
}

#[test]
fn print_renders_nested_and_cyclic_tables() {
    assert_eq!(
        output("local t = {1, name = 'x'} t.self = t print(t)"),
        "{\n  [1]: 1\n  [\"name\"]: \"x\"\n  [\"self\"]: ** cyclic table detected **\n}\n"
    );
}

// ==================== Calls and functions ====================

#[test]
fn multiple_returns_truncate_outside_last_position() {
    assert_eq!(
        eval("function f() return 1, 2 end local a, b = f() local c, d = f(), 9 return a, b, c, d"),
        vec!["1", "2", "1", "9"]
    );
    assert_eq!(eval("local function f() return 1, 2 end return (f())"), vec!["1"]);
    assert_eq!(eval("local function f() return 1, 2 end local t = {f(), f()} return #t, t[3]"), vec!["3", "2"]);
}

#[test]
fn varargs() {
    assert_eq!(
        eval("local function f(a, ...) local n = select('#', ...) return a, n, ... end return f(1, 2, 3)"),
        vec!["1", "2", "2", "3"]
    );
}

#[test]
fn closures_capture_by_reference() {
    assert_eq!(eval("local x = 1 local function get() return x end x = 2 return get()"), vec!["2"]);
    assert_eq!(
        eval(
            "local function counter()
               local n = 0
               return function() n = n + 1 return n end
             end
             local c = counter()
             c() c()
             return c()"
        ),
        vec!["3"]
    );
}

#[test]
fn recursion_and_stack_overflow() {
    assert_eq!(
        eval("local function fib(n) if n < 2 then return n end return fib(n - 1) + fib(n - 2) end return fib(15)"),
        vec!["610"]
    );
    let mut interpreter = Interpreter::with_options(InterpreterOptions {
        max_call_depth: 40,
        ..InterpreterOptions::default()
    });
    let err = interpreter.run("local function f() return f() + 1 end f()").unwrap_err();
    assert_eq!(err.to_string(), "stack overflow");
}

#[test]
fn default_options_fit_a_default_thread() {
    let outcome = std::thread::spawn(|| {
        let mut interpreter = Interpreter::new().with_output(OutputBuffer::new());
        let deep = interpreter
            .run("local function f(n) if n == 0 then return 0 end return 1 + f(n - 1) end return f(1000)")
            .map(|_| ())
            .map_err(|err| err.to_string());
        let shallow = interpreter
            .run("local function f(n) if n == 0 then return 0 end return 1 + f(n - 1) end return f(10)")
            .map(|values| values[0].to_string())
            .map_err(|err| err.to_string());
        (deep, shallow)
    })
    .join()
    .unwrap();
    assert_eq!(outcome, (Err("stack overflow".to_string()), Ok("10".to_string())));
}

#[test]
fn deep_nesting_is_a_syntax_error() {
    let source = format!("return {}1{}", "(".repeat(20_000), ")".repeat(20_000));
    let err = parse_source(&source, "nested.lua").unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
    let rendered = err.render("nested.lua");
    assert!(rendered.starts_with("nested.lua:1:"), "{}", rendered);
    assert!(rendered.contains("chunk has too many syntax levels near `(`"), "{}", rendered);
}

#[test]
fn library_limits_raise_errors() {
    assert_eq!(run_err("return unpack({}, -9e18, 9e18)").to_string(), "too many results to unpack");
    assert_eq!(run_err("return string.rep('x', 1e18)").to_string(), "resulting string too large");
    assert_eq!(eval("return #string.rep('', 1e18)"), vec!["0"]);
    assert_eq!(
        eval("return string.sub('abc', -1e19, 1e19), string.byte('abc', -1e19, 1e19)"),
        vec!["abc", "97", "98", "99"]
    );
}

#[test]
fn call_errors_name_the_callee() {
    assert_eq!(run_err("missing()").to_string(), "attempt to call a nil value (global 'missing')");
    assert_eq!(
        run_err("local t = {} t.go()").to_string(),
        "attempt to call a nil value (field 'go')"
    );
}

#[test]
fn callable_tables() {
    assert_eq!(
        eval("local t = setmetatable({}, {__call = function(self, a) return a * 2 end}) return t(21)"),
        vec!["42"]
    );
}

// ==================== Control flow ====================

#[test]
fn break_stops_only_the_innermost_loop() {
    assert_eq!(
        output(
            "local i = 0
             while i < 3 do
               i = i + 1
               local j = 0
               while true do
                 j = j + 1
                 if j == 2 then break end
               end
               print(i, j)
             end"
        ),
        "1 2\n2 2\n3 2\n"
    );
}

#[test]
fn continue_skips_one_pass() {
    assert_eq!(
        eval(
            "local sum = 0
             for i = 1, 10 do
               if i % 2 == 0 then continue end
               sum = sum + i
             end
             return sum"
        ),
        vec!["25"]
    );
}

#[test]
fn loop_forms() {
    assert_eq!(eval("local s = 0 for i = 10, 1, -3 do s = s + i end return s"), vec!["22"]);
    assert_eq!(eval("local n = 0 repeat local done = n >= 3 n = n + 1 until done return n"), vec!["4"]);
    assert_eq!(
        eval("local s = '' for i, v in ipairs({'a', 'b', nil, 'd'}) do s = s .. i .. v end return s"),
        vec!["1a2b"]
    );
    assert_eq!(run_err("for i = 1, 2, 0 do end").to_string(), "'for' step is zero");
}

#[test]
fn if_elseif_chain() {
    assert_eq!(
        eval(
            "local function grade(n)
               if n > 90 then return 'a' elseif n > 80 then return 'b' elseif n > 70 then return 'c' else return 'f' end
             end
             return grade(95), grade(85), grade(75), grade(10)"
        ),
        vec!["a", "b", "c", "f"]
    );
}

#[test]
fn compound_assignment() {
    assert_eq!(
        eval("local t = {n = 1} t.n += 4 t.n *= 2 local s = 'a' s ..= 'b' return t.n, s"),
        vec!["10", "ab"]
    );
}

// ==================== Errors at the host boundary ====================

#[test]
fn pcall_recovers_runtime_errors() {
    assert_eq!(
        eval("local ok, err = pcall(function() local x = nil return x.y end) return ok, err"),
        vec!["false", "attempt to index a nil value"]
    );
    assert_eq!(
        eval("local ok, err = pcall(error, {code = 7}) return ok, err.code"),
        vec!["false", "7"]
    );
}

#[test]
fn host_can_continue_after_a_failed_script() {
    let buffer = OutputBuffer::new();
    let mut interpreter = Interpreter::new().with_output(buffer.clone());
    let err = interpreter.run("shared = 1\nerror('stop')").unwrap_err();
    assert!(interpreter.has_error());
    assert_eq!(err.to_string(), "stop");

    interpreter.clear_error();
    interpreter.run("print(shared + 1)").unwrap();
    assert_eq!(buffer.contents(), "2\n");
}

#[test]
fn string_methods_through_the_string_table() {
    assert_eq!(
        eval("local s = 'Hello' return s:upper(), s:sub(2, -2), ('%d-%s'):format(5, 'x'), #s"),
        vec!["HELLO", "ell", "5-x", "5"]
    );
    assert_eq!(run_err("return ('x'):match('.')").to_string(), "Lua patterns are not implemented");
}
