pub mod cl_gui;
pub mod cl_main;
pub mod cl_parse;
