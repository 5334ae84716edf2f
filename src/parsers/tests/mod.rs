mod html_parser_tests;
mod integration_tests;
mod text_parser_tests;
