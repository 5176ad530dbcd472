//! Typed table of the editor's remote methods.
//!
//! Each constant pairs a method name with the type its result decodes into,
//! so [`crate::Session::request`] needs no per-call glue. Methods whose
//! result has no fixed shape (variables, options, dictionaries) decode into
//! [`Object`], which reports them as unsupported.

use std::fmt;
use std::marker::PhantomData;

use crate::decode::{Object, PartialList};
use crate::types::{Buffer, Position, Tabpage, Window};

/// A remote method together with its result type.
pub struct Method<R> {
    name: &'static str,
    result: PhantomData<fn() -> R>,
}

impl<R> Method<R> {
    /// Declares a method named `name` whose result decodes as `R`.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            result: PhantomData,
        }
    }

    /// Name sent on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }
}

impl<R> Clone for Method<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Method<R> {}

impl<R> fmt::Debug for Method<R> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_tuple("Method").field(&self.name).finish()
    }
}

impl<R> fmt::Display for Method<R> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name)
    }
}

macro_rules! methods {
    ($($constant:ident: $result:ty = $name:literal;)*) => {
        $(
            #[doc = concat!("`", $name, "`")]
            pub const $constant: Method<$result> = Method::new($name);
        )*

        /// Every method name in the table, in declaration order.
        pub const METHOD_NAMES: &[&str] = &[$($name),*];
    };
}

methods! {
    // Buffers
    BUF_LINE_COUNT: i64 = "nvim_buf_line_count";
    BUF_GET_LINES: PartialList<String> = "nvim_buf_get_lines";
    BUF_SET_LINES: () = "nvim_buf_set_lines";
    BUF_GET_VAR: Object = "nvim_buf_get_var";
    BUF_GET_CHANGEDTICK: i64 = "nvim_buf_get_changedtick";
    BUF_GET_KEYMAP: Object = "nvim_buf_get_keymap";
    BUF_SET_VAR: () = "nvim_buf_set_var";
    BUF_DEL_VAR: () = "nvim_buf_del_var";
    BUF_GET_OPTION: Object = "nvim_buf_get_option";
    BUF_SET_OPTION: () = "nvim_buf_set_option";
    BUF_GET_NAME: String = "nvim_buf_get_name";
    BUF_SET_NAME: () = "nvim_buf_set_name";
    BUF_IS_VALID: bool = "nvim_buf_is_valid";
    BUF_GET_MARK: Position = "nvim_buf_get_mark";
    BUF_ADD_HIGHLIGHT: i64 = "nvim_buf_add_highlight";
    BUF_CLEAR_HIGHLIGHT: () = "nvim_buf_clear_highlight";

    // Tabpages
    TABPAGE_LIST_WINS: PartialList<Window> = "nvim_tabpage_list_wins";
    TABPAGE_GET_VAR: Object = "nvim_tabpage_get_var";
    TABPAGE_SET_VAR: () = "nvim_tabpage_set_var";
    TABPAGE_DEL_VAR: () = "nvim_tabpage_del_var";
    TABPAGE_GET_WIN: Window = "nvim_tabpage_get_win";
    TABPAGE_GET_NUMBER: i64 = "nvim_tabpage_get_number";
    TABPAGE_IS_VALID: bool = "nvim_tabpage_is_valid";

    // UI
    UI_ATTACH: () = "nvim_ui_attach";
    UI_DETACH: () = "nvim_ui_detach";
    UI_TRY_RESIZE: () = "nvim_ui_try_resize";
    UI_SET_OPTION: () = "nvim_ui_set_option";

    // Global
    COMMAND: () = "nvim_command";
    FEEDKEYS: () = "nvim_feedkeys";
    INPUT: i64 = "nvim_input";
    REPLACE_TERMCODES: String = "nvim_replace_termcodes";
    COMMAND_OUTPUT: String = "nvim_command_output";
    EVAL: Object = "nvim_eval";
    CALL_FUNCTION: Object = "nvim_call_function";
    EXECUTE_LUA: Object = "nvim_execute_lua";
    STRWIDTH: i64 = "nvim_strwidth";
    LIST_RUNTIME_PATHS: PartialList<String> = "nvim_list_runtime_paths";
    SET_CURRENT_DIR: () = "nvim_set_current_dir";
    GET_CURRENT_LINE: String = "nvim_get_current_line";
    SET_CURRENT_LINE: () = "nvim_set_current_line";
    DEL_CURRENT_LINE: () = "nvim_del_current_line";
    GET_VAR: Object = "nvim_get_var";
    SET_VAR: () = "nvim_set_var";
    DEL_VAR: () = "nvim_del_var";
    GET_VVAR: Object = "nvim_get_vvar";
    GET_OPTION: Object = "nvim_get_option";
    SET_OPTION: () = "nvim_set_option";
    OUT_WRITE: () = "nvim_out_write";
    ERR_WRITE: () = "nvim_err_write";
    ERR_WRITELN: () = "nvim_err_writeln";
    LIST_BUFS: PartialList<Buffer> = "nvim_list_bufs";
    GET_CURRENT_BUF: Buffer = "nvim_get_current_buf";
    SET_CURRENT_BUF: () = "nvim_set_current_buf";
    LIST_WINS: PartialList<Window> = "nvim_list_wins";
    GET_CURRENT_WIN: Window = "nvim_get_current_win";
    SET_CURRENT_WIN: () = "nvim_set_current_win";
    LIST_TABPAGES: PartialList<Tabpage> = "nvim_list_tabpages";
    GET_CURRENT_TABPAGE: Tabpage = "nvim_get_current_tabpage";
    SET_CURRENT_TABPAGE: () = "nvim_set_current_tabpage";
    SUBSCRIBE: () = "nvim_subscribe";
    UNSUBSCRIBE: () = "nvim_unsubscribe";
    GET_COLOR_BY_NAME: i64 = "nvim_get_color_by_name";
    GET_COLOR_MAP: Object = "nvim_get_color_map";
    GET_MODE: Object = "nvim_get_mode";
    GET_KEYMAP: Object = "nvim_get_keymap";
    GET_API_INFO: Object = "nvim_get_api_info";
    CALL_ATOMIC: Object = "nvim_call_atomic";

    // Windows
    WIN_GET_BUF: Buffer = "nvim_win_get_buf";
    WIN_GET_CURSOR: Position = "nvim_win_get_cursor";
    WIN_SET_CURSOR: () = "nvim_win_set_cursor";
    WIN_GET_HEIGHT: i64 = "nvim_win_get_height";
    WIN_SET_HEIGHT: () = "nvim_win_set_height";
    WIN_GET_WIDTH: i64 = "nvim_win_get_width";
    WIN_SET_WIDTH: () = "nvim_win_set_width";
    WIN_GET_VAR: Object = "nvim_win_get_var";
    WIN_SET_VAR: () = "nvim_win_set_var";
    WIN_DEL_VAR: () = "nvim_win_del_var";
    WIN_GET_OPTION: Object = "nvim_win_get_option";
    WIN_SET_OPTION: () = "nvim_win_set_option";
    WIN_GET_POSITION: Position = "nvim_win_get_position";
    WIN_GET_TABPAGE: Tabpage = "nvim_win_get_tabpage";
    WIN_GET_NUMBER: i64 = "nvim_win_get_number";
    WIN_IS_VALID: bool = "nvim_win_is_valid";
}

/// Notification names the editor pushes to attached UIs.
pub mod events {
    /// Batched screen updates after `nvim_ui_attach`.
    pub const REDRAW: &str = "redraw";
}
