mod test_junction_basic;
mod test_sphere_basic;
mod test_tube_basic;
